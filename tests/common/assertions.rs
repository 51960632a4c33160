//! Custom assertion macros

/// Assert that a result is ok and return the value
macro_rules! assert_ok {
    ($result:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("Expected Ok, got Err: {:?}", e),
        }
    };
    ($result:expr, $message:expr) => {
        match $result {
            Ok(value) => value,
            Err(e) => panic!("{}: {:?}", $message, e),
        }
    };
}

/// Assert that two floats are approximately equal
macro_rules! assert_approx_eq {
    ($left:expr, $right:expr) => {
        assert_approx_eq!($left, $right, 1e-9)
    };
    ($left:expr, $right:expr, $epsilon:expr) => {
        let (left, right): (f64, f64) = ($left, $right);
        assert!(
            (left - right).abs() < $epsilon,
            "Values are not approximately equal: {} vs {}",
            left,
            right
        );
    };
}

/// Assert that every request was sent to the given `METHOD path` list, in order
macro_rules! assert_sent {
    ($remote:expr, [$($line:expr),* $(,)?]) => {
        pretty_assertions::assert_eq!($remote.sent_lines(), vec![$($line.to_string()),*]);
    };
}
