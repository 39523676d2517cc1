#[test]
fn test_simple() {
    assert_eq!(empty(), Ok("The world is big".to_string())); // [Miss] The cache is empty.
    assert_eq!(empty(), Ok("The world is big".to_string())); // [Hit] Always a hit from now on.

    assert_eq!(double(2), Ok(4)); // [Miss] The cache is empty.
    assert_eq!(double(4), Ok(8)); // [Miss] Different number.
    assert_eq!(double(2), Ok(4)); // [Hit] Same number as initially.

    assert_eq!(sum(2, 4), Ok(6)); // [Miss] The cache is empty.
    assert_eq!(sum(2, 3), Ok(5)); // [Miss] Different numbers.
    assert_eq!(sum(2, 3), Ok(5)); // [Hit]  Same numbers
    assert_eq!(sum(4, 2), Ok(6)); // [Miss] Different numbers.
}

/// Build a string.
#[veritas::memoize]
fn empty() -> String {
    format!("The world is {}", "big")
}

/// Double a number.
#[veritas::memoize]
fn double(x: u32) -> u32 {
    2 * x
}

/// Compute the sum of two numbers.
#[veritas::memoize]
fn sum(a: u32, b: u32) -> u32 {
    a + b
}
