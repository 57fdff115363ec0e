//! Script-filter feedback
//!
//! The JSON document the launcher reads from stdout: a list of items, each
//! with an `arg` payload and optional modifier-key variants, plus workflow
//! variables and an optional rerun interval.

use serde::Serialize;
use std::collections::BTreeMap;

/// Variables passed to the actions that run when an item is selected
pub type Variables = BTreeMap<String, String>;

/// Top-level script-filter response
#[derive(Debug, Default, Serialize)]
pub struct Feedback {
    /// Seconds after which the launcher runs the script filter again
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerun: Option<f64>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: Variables,
    pub items: Vec<Item>,
}

impl Feedback {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, item: Item) {
        self.items.push(item);
    }

    pub fn extend(&mut self, items: impl IntoIterator<Item = Item>) {
        self.items.extend(items);
    }

    /// Ask for a rerun; the shortest requested interval wins
    pub fn request_rerun(&mut self, seconds: f64) {
        self.rerun = Some(match self.rerun {
            Some(current) => current.min(seconds),
            None => seconds,
        });
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Icon {
    pub path: String,
}

/// Modifier keys with their own action
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ModKey {
    Alt,
    Cmd,
}

/// Alternative action while a modifier key is held
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Modifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: Variables,
}

impl Modifier {
    pub fn new(subtitle: impl Into<String>, arg: impl Into<String>, valid: bool) -> Self {
        Self {
            subtitle: Some(subtitle.into()),
            arg: Some(arg.into()),
            valid,
            variables: Variables::new(),
        }
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }
}

/// One result row
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Item {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub title: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subtitle: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub arg: Option<String>,
    pub valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub autocomplete: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub item_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<Icon>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub quicklookurl: Option<String>,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub variables: Variables,
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub mods: BTreeMap<ModKey, Modifier>,
}

impl Item {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn subtitle(mut self, subtitle: impl Into<String>) -> Self {
        self.subtitle = Some(subtitle.into());
        self
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.arg = Some(arg.into());
        self
    }

    pub fn valid(mut self, valid: bool) -> Self {
        self.valid = valid;
        self
    }

    pub fn uid(mut self, uid: impl Into<String>) -> Self {
        self.uid = Some(uid.into());
        self
    }

    pub fn autocomplete(mut self, autocomplete: impl Into<String>) -> Self {
        self.autocomplete = Some(autocomplete.into());
        self
    }

    pub fn icon(mut self, path: impl Into<String>) -> Self {
        self.icon = Some(Icon { path: path.into() });
        self
    }

    pub fn item_type(mut self, item_type: impl Into<String>) -> Self {
        self.item_type = Some(item_type.into());
        self
    }

    pub fn quicklookurl(mut self, url: Option<String>) -> Self {
        self.quicklookurl = url;
        self
    }

    pub fn var(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.variables.insert(key.into(), value.into());
        self
    }

    pub fn modifier(mut self, key: ModKey, modifier: Modifier) -> Self {
        self.mods.insert(key, modifier);
        self
    }
}
