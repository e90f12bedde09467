//! AWS service catalogue used for node type selection and display names.

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Service {
    pub key: &'static str,
    pub name: &'static str,
}

#[derive(Clone, Copy, Debug)]
pub struct ServiceCategory {
    pub key: &'static str,
    pub label: &'static str,
    pub services: &'static [Service],
}

const fn svc(key: &'static str, name: &'static str) -> Service {
    Service { key, name }
}

pub const CATALOG: &[ServiceCategory] = &[
    ServiceCategory {
        key: "compute",
        label: "Compute",
        services: &[svc("lambda", "Lambda"), svc("ec2", "EC2"), svc("ecs", "ECS"), svc("fargate", "Fargate")],
    },
    ServiceCategory {
        key: "storage",
        label: "Storage",
        services: &[svc("s3", "S3"), svc("efs", "EFS"), svc("ebs", "EBS")],
    },
    ServiceCategory {
        key: "database",
        label: "Database",
        services: &[
            svc("dynamodb", "DynamoDB"),
            svc("rds", "RDS"),
            svc("aurora", "Aurora"),
            svc("elasticache", "ElastiCache"),
        ],
    },
    ServiceCategory {
        key: "networking",
        label: "Networking",
        services: &[
            svc("apigateway", "API Gateway"),
            svc("cloudfront", "CloudFront"),
            svc("route53", "Route 53"),
            svc("vpc", "VPC"),
            svc("alb", "ALB/ELB"),
        ],
    },
    ServiceCategory {
        key: "integration",
        label: "Integration",
        services: &[
            svc("sqs", "SQS"),
            svc("sns", "SNS"),
            svc("eventbridge", "EventBridge"),
            svc("stepfunctions", "Step Functions"),
        ],
    },
    ServiceCategory {
        key: "security",
        label: "Security",
        services: &[svc("cognito", "Cognito"), svc("iam", "IAM"), svc("waf", "WAF")],
    },
    ServiceCategory {
        key: "other",
        label: "Other",
        services: &[svc("cloudwatch", "CloudWatch"), svc("generic", "Generic")],
    },
];

pub fn service_by_key(key: &str) -> Option<&'static Service> {
    CATALOG.iter().flat_map(|c| c.services.iter()).find(|s| s.key == key)
}

pub fn all_services() -> Vec<&'static Service> {
    CATALOG.iter().flat_map(|c| c.services.iter()).collect()
}

/// Display name for a node type. Unknown keys are shown upper-cased.
pub fn service_name(key: &str) -> String {
    match service_by_key(key) {
        Some(s) => s.name.to_string(),
        None if key.is_empty() => "GENERIC".to_string(),
        None => key.to_uppercase(),
    }
}
