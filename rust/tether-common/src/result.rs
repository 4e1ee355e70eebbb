pub type Result<T> = std::result::Result<T, crate::error::Error>;

/// Fails the enclosing function with a `RangeError` unless `$expr` holds.
#[macro_export]
macro_rules! verify_range {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_range(result, stringify!($name), stringify!($expr))?;
    }};
}

/// Fails the enclosing function with a `TypeError` unless `$expr` holds.
#[macro_export]
macro_rules! verify_type {
    ($name:expr, $expr:expr) => {{
        let result = $expr;
        $crate::result::verify_type(result, stringify!($name), stringify!($expr))?;
    }};
}

#[inline]
pub fn verify_range(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        range_error(name, condition)
    }
}

#[inline]
pub fn verify_type(predicate: bool, name: &str, condition: &str) -> Result<()> {
    if predicate {
        Ok(())
    } else {
        type_error(name, condition)
    }
}

#[cold]
pub fn range_error(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::Range {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}

#[cold]
pub fn type_error(name: &str, condition: &str) -> Result<()> {
    Err(crate::error::ErrorKind::Type {
        name: name.to_string(),
        message: condition.to_string(),
    }
    .into())
}
