pub mod error;
pub mod phone;

#[cfg(test)]
pub mod test_support;
