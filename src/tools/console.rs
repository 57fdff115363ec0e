//! AWS console shortcuts (`+ <service>`)

use crate::feedback::{Feedback, Item};
use crate::search::{MatchOn, SearchEngine};
use crate::tools::util::{global_console_url, regional_console_url};

/// Whether a service's console lives on the regional host
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Host {
    Regional,
    Global,
}

/// One console service
#[derive(Debug, Clone, Copy)]
pub struct ConsoleService {
    pub key: &'static str,
    pub name: &'static str,
    host: Host,
    path: &'static str,
}

impl ConsoleService {
    const fn regional(key: &'static str, name: &'static str, path: &'static str) -> Self {
        Self { key, name, host: Host::Regional, path }
    }

    const fn global(key: &'static str, name: &'static str, path: &'static str) -> Self {
        Self { key, name, host: Host::Global, path }
    }

    pub fn url(&self, region: &str) -> String {
        match self.host {
            Host::Regional => regional_console_url(region, self.path),
            // QuickSight has no per-region console page
            Host::Global if self.key == "quicksight" => self.path.to_string(),
            Host::Global => global_console_url(region, self.path),
        }
    }

    pub fn icon(&self) -> String {
        format!("icons/services/{}.png", self.key)
    }
}

pub const SERVICES: &[ConsoleService] = &[
    ConsoleService::regional("ec2", "Virtual Servers in the Cloud", "ec2/v2/home"),
    ConsoleService::regional("ecs", "Run and Manage Docker Containers", "ecs/home"),
    ConsoleService::regional(
        "elasticbeanstalk",
        "Run and Manage Web Apps",
        "elasticbeanstalk/home",
    ),
    ConsoleService::regional("lambda", "Run Code without Thinking about Servers", "lambda/home"),
    ConsoleService::global(
        "servermigration",
        "Migrate on-premises servers to AWS",
        "servermigration/home",
    ),
    ConsoleService::global("s3", "Scalable Storage in the Cloud", "s3/home"),
    ConsoleService::global("cloudfront", "Global Content Delivery Network", "cloudfront/home"),
    ConsoleService::regional("efs", "Fully Managed File System for EC2", "efs/home"),
    ConsoleService::regional("glacier", "Archive Storage in the Cloud", "glacier/home"),
    ConsoleService::global("snowball", "Large Scale Data Transport", "importexport/home"),
    ConsoleService::regional("storagegateway", "Hybrid Storage Integration", "storagegateway/home"),
    ConsoleService::regional("rds", "Managed Relational Database Service", "rds/home"),
    ConsoleService::regional("dynamodb", "Managed NoSQL Database", "dynamodb/home"),
    ConsoleService::regional("elasticache", "In-Memory Cache", "elasticache/home"),
    ConsoleService::regional(
        "redshift",
        "Fast, Simple, Cost-Effective Data Warehousing",
        "redshift/home",
    ),
    ConsoleService::regional("dms", "Managed Database Migration Service", "dms/home"),
    ConsoleService::regional("vpc", "Isolated Cloud Resources", "vpc/home"),
    ConsoleService::regional(
        "directconnect",
        "Dedicated Network Connection to AWS",
        "directconnect/home",
    ),
    ConsoleService::global("route53", "Scalable DNS and Domain Name Registration", "route53/home"),
    ConsoleService::regional(
        "codecommit",
        "Store Code in Private Git Repositories",
        "codecommit/home",
    ),
    ConsoleService::regional("codedeploy", "Automate Code Deployments", "codedeploy/home"),
    ConsoleService::regional(
        "codepipeline",
        "Release Software using Continuous Delivery",
        "codepipeline/home",
    ),
    ConsoleService::regional("cloudwatch", "Monitor Resources and Applications", "cloudwatch/home"),
    ConsoleService::regional(
        "cloudformation",
        "Create and Manage Resources with Templates",
        "cloudformation/home",
    ),
    ConsoleService::regional("cloudtrail", "Track User Activity and API Usage", "cloudtrail/home"),
    ConsoleService::regional("config", "Track Resource Inventory and Changes", "config/home"),
    ConsoleService::global("opsworks", "Automate Operations with Chef", "opsworks/landing/home"),
    ConsoleService::regional("catalog", "Create and Use Standardized Products", "catalog/home"),
    ConsoleService::global(
        "trustedadvisor",
        "Optimize Performance and Security",
        "trustedadvisor/home",
    ),
    ConsoleService::global("iam", "Manage User Access and Encryption Keys", "iam/home"),
    ConsoleService::regional(
        "directoryservice",
        "Host and Manage Active Directory",
        "directoryservice/home",
    ),
    ConsoleService::regional("inspector", "Analyze Application Security", "inspector/home"),
    ConsoleService::global("waf", "Filter Malicious Web Traffic", "waf/home"),
    ConsoleService::regional(
        "acm",
        "Provision, Manage, and Deploy SSL/TLS Certificates",
        "acm/home",
    ),
    ConsoleService::regional(
        "elasticmapreduce",
        "Managed Hadoop Framework",
        "elasticmapreduce/home",
    ),
    ConsoleService::global(
        "datapipeline",
        "Orchestration for Data-Driven Workflows",
        "datapipeline/home",
    ),
    ConsoleService::regional("es", "Run and Scale Elasticsearch Clusters", "es/home"),
    ConsoleService::regional("kinesis", "Work with Real-Time Streaming Data", "kinesis/home"),
    ConsoleService::global(
        "machinelearning",
        "Build Smart Applications Quickly and Easily",
        "machinelearning/home",
    ),
    ConsoleService::global(
        "quicksight",
        "Fast, easy to use business analytics",
        "https://quicksight.aws.amazon.com",
    ),
    ConsoleService::regional("iot", "Connect Devices to the Cloud", "iot/home"),
    ConsoleService::regional(
        "gamelift",
        "Deploy and Scale Session-based Multiplayer Games",
        "gamelift/home",
    ),
    ConsoleService::global("mobilehub", "Build, Test, and Monitor Mobile Apps", "mobilehub/home"),
    ConsoleService::regional(
        "cognito",
        "User Identity and App Data Synchronization",
        "cognito/home",
    ),
    ConsoleService::global(
        "devicefarm",
        "Test Android, iOS, and Web Apps on Real Devices in the Cloud",
        "devicefarm/home",
    ),
    ConsoleService::global(
        "mobileanalytics",
        "Collect, View and Export App Analytics",
        "mobileanalytics/home",
    ),
    ConsoleService::regional("sns", "Push Notification Service", "sns/home"),
    ConsoleService::regional("apigateway", "Build, Deploy and Manage APIs", "apigateway/home"),
    ConsoleService::global("appstream", "Low Latency Application Streaming", "appstream/home"),
    ConsoleService::regional("cloudsearch", "Managed Search Service", "cloudsearch/home"),
    ConsoleService::regional(
        "elastictranscoder",
        "Easy-to-Use Scalable Media Transcoding",
        "elastictranscoder/home",
    ),
    ConsoleService::regional("ses", "Email Sending and Receiving Service", "ses/home"),
    ConsoleService::global("sqs", "Message Queue Service", "sqs/home"),
    ConsoleService::regional(
        "swf",
        "Workflow Service for Coordinating Application Components",
        "swf/home",
    ),
    ConsoleService::regional("workspaces", "Desktops in the Cloud", "workspaces/home"),
    ConsoleService::global(
        "workdocs",
        "Secure Enterprise Storage and Sharing Service",
        "zocalo/home",
    ),
    ConsoleService::regional("workmail", "Secure Email and Calendaring Service", "workmail/home"),
];

/// List console services for `region`, filtered by key when `query` is set.
/// `complete` is the query prefix that selected this command.
pub fn execute_console(query: &str, complete: &str, region: &str, feedback: &mut Feedback) {
    let services = SearchEngine::new().filter(
        query,
        SERVICES.to_vec(),
        |s| s.key.to_string(),
        MatchOn::ALL,
    );

    feedback.extend(services.into_iter().map(|service| {
        Item::new(service.key)
            .subtitle(service.name)
            .arg(service.url(region))
            .valid(true)
            .autocomplete(format!("{}{}", complete, service.key))
            .icon(service.icon())
            .var("action", "open-url")
    }));
}
