//! Region equivalence for region-sensitive resources
//!
//! Some resources may live in a region other than their stack's. Their
//! `Region` property is optional: an empty value means "the stack's
//! region". An update that switches between the implicit and the explicit
//! form of the same region must not be treated as a move.

/// Extract the region field of an ARN.
///
/// Returns `None` for strings that are not ARNs and for ARNs of global
/// resources, whose region field is empty.
pub fn arn_region(arn: &str) -> Option<&str> {
    let mut fields = arn.splitn(5, ':');
    if fields.next()? != "arn" {
        return None;
    }
    let _partition = fields.next()?;
    let _service = fields.next()?;
    let region = fields.next()?;
    // The account field must follow, otherwise this is not an ARN
    fields.next()?;
    (!region.is_empty()).then_some(region)
}

/// Decide whether `old_region` and `new_region` denote the same region.
///
/// `stack_id` is the ARN of the enclosing stack; its region stands in for
/// whichever side is empty. First match wins:
///
/// 1. identical strings (including both empty) are the same region;
/// 2. two different explicit regions are different;
/// 3. otherwise one side is implicit, and the regions are the same when the
///    stack's region equals the explicit one.
pub fn is_same_region(stack_id: &str, old_region: &str, new_region: &str) -> bool {
    if old_region == new_region {
        return true;
    }
    if !old_region.is_empty() && !new_region.is_empty() {
        return false;
    }
    match arn_region(stack_id) {
        Some(stack_region) => stack_region == old_region || stack_region == new_region,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const STACK_ID: &str =
        "arn:aws:cloudformation:us-west-2:123456789012:stack/teststack/51af3dc0-da77-11e4-872e-1234567db123";

    #[test]
    fn test_arn_region() {
        assert_eq!(arn_region(STACK_ID), Some("us-west-2"));
        assert_eq!(
            arn_region("arn:aws-cn:cloudformation:cn-north-1:1:stack/s/id"),
            Some("cn-north-1")
        );
        assert_eq!(arn_region("arn:aws:s3:::bucket"), None);
        assert_eq!(arn_region("not-an-arn"), None);
        assert_eq!(arn_region("arn:aws:iam"), None);
    }

    #[test]
    fn test_same_region() {
        assert!(is_same_region("", "", ""));
        assert!(is_same_region("", "us-east-1", "us-east-1"));
        assert!(is_same_region(STACK_ID, "", "us-west-2"));
        assert!(is_same_region(STACK_ID, "us-west-2", ""));
    }

    #[test]
    fn test_different_region() {
        assert!(!is_same_region("", "us-east-1", "us-east-2"));
        assert!(!is_same_region(STACK_ID, "us-east-1", "us-east-2"));
        assert!(!is_same_region(STACK_ID, "", "us-west-1"));
        assert!(!is_same_region(STACK_ID, "us-west-1", ""));
    }

    #[test]
    fn test_implicit_region_without_stack_region() {
        assert!(!is_same_region("stack-name", "", "us-west-2"));
    }

    const REGIONS: &[&str] = &["", "us-east-1", "us-west-1", "us-west-2"];

    proptest! {
        /// Swapping old and new never changes the answer
        #[test]
        fn same_region_is_symmetric(
            old in prop::sample::select(REGIONS),
            new in prop::sample::select(REGIONS)
        ) {
            prop_assert_eq!(
                is_same_region(STACK_ID, old, new),
                is_same_region(STACK_ID, new, old)
            );
        }

        /// An explicit region is always equivalent to itself
        #[test]
        fn same_region_is_reflexive(region in "[a-z]{2}-[a-z]{4,9}-[1-9]") {
            prop_assert!(is_same_region(STACK_ID, &region, &region));
        }
    }
}
