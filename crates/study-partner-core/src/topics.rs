//! Static catalog of certification topics served by `/api/topics`.

use crate::models::Topic;

pub const TOPICS: &[Topic] = &[
    Topic {
        id: "s3",
        name: "S3 - Simple Storage Service",
        icon: "📦",
        description: "Object storage with high scalability and durability",
    },
    Topic {
        id: "ec2",
        name: "EC2 - Elastic Compute Cloud",
        icon: "🖥️",
        description: "Scalable virtual servers in the cloud",
    },
    Topic {
        id: "vpc",
        name: "VPC - Virtual Private Cloud",
        icon: "🔒",
        description: "Isolated cloud resources and networking",
    },
    Topic {
        id: "iam",
        name: "IAM - Identity & Access Management",
        icon: "👤",
        description: "Secure access control for AWS resources",
    },
    Topic {
        id: "rds",
        name: "RDS - Relational Database Service",
        icon: "🗄️",
        description: "Managed relational databases",
    },
    Topic {
        id: "lambda",
        name: "Lambda - Serverless Compute",
        icon: "⚡",
        description: "Run code without managing servers",
    },
    Topic {
        id: "cloudfront",
        name: "CloudFront - CDN",
        icon: "🌐",
        description: "Content delivery network for fast distribution",
    },
    Topic {
        id: "route53",
        name: "Route 53 - DNS Service",
        icon: "🗺️",
        description: "Scalable domain name system",
    },
    Topic {
        id: "cloudwatch",
        name: "CloudWatch - Monitoring",
        icon: "📊",
        description: "Monitor resources and applications",
    },
    Topic {
        id: "dynamodb",
        name: "DynamoDB - NoSQL Database",
        icon: "🔢",
        description: "Fast and flexible NoSQL database",
    },
    Topic {
        id: "elasticache",
        name: "ElastiCache - Caching",
        icon: "⚡",
        description: "In-memory data store and cache",
    },
    Topic {
        id: "sns",
        name: "SNS - Simple Notification Service",
        icon: "📢",
        description: "Pub/sub messaging and mobile notifications",
    },
    Topic {
        id: "sqs",
        name: "SQS - Simple Queue Service",
        icon: "📮",
        description: "Fully managed message queuing",
    },
    Topic {
        id: "elb",
        name: "ELB - Elastic Load Balancing",
        icon: "⚖️",
        description: "Distribute traffic across targets",
    },
];

/// Service keywords recognized when summarizing a session's topics.
pub const SESSION_TOPIC_KEYWORDS: &[&str] = &["s3", "ec2", "vpc", "iam", "rds", "lambda"];

pub fn topics() -> &'static [Topic] {
    TOPICS
}
