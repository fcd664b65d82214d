//! Interface tests for the FIFO device using Cucumber.
//!
//! The scenarios describe the contract every open file sees: blocking
//! reads, replace-on-write, truncation, per-file cursors and reset.
//!
//! ```bash
//! cargo test --test interfaces --features test-utils
//! ```

mod steps;

use cucumber::World;
use steps::fifo_device::FifoDeviceWorld;

#[tokio::main]
async fn main() {
    println!("\n=== Running FIFO Device Interface Tests ===\n");
    FifoDeviceWorld::cucumber()
        .fail_on_skipped()
        .run("tests/interfaces/features/fifo_device.feature")
        .await;
}
