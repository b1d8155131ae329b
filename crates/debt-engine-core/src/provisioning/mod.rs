pub mod expected_loss;
pub mod staging;
