#[cfg(test)]
pub mod fake_gateway;
