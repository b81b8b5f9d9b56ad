//! ARN construction for the fixed local account.
//!
//! MicroStack emulates a single account in a single region; every ARN it
//! hands out is built from these constants.

/// The account ID MicroStack reports everywhere.
pub const ACCOUNT_ID: &str = "000000000000";

/// The region MicroStack reports everywhere.
pub const REGION: &str = "us-east-1";

/// ARN for a Lambda function.
#[must_use]
pub fn function_arn(name: &str) -> String {
    format!("arn:aws:lambda:{REGION}:{ACCOUNT_ID}:function:{name}")
}

/// ARN for a CloudWatch log group.
#[must_use]
pub fn log_group_arn(name: &str) -> String {
    format!("arn:aws:logs:{REGION}:{ACCOUNT_ID}:log-group:{name}")
}

/// ARN for a CloudFormation stack; `stack_uuid` disambiguates recreations.
#[must_use]
pub fn stack_arn(name: &str, stack_uuid: &str) -> String {
    format!("arn:aws:cloudformation:{REGION}:{ACCOUNT_ID}:stack/{name}/{stack_uuid}")
}
