use clap::Parser;
use scholarflow::commandline::Commandline;
use scholarflow::error::ScholarflowError;

#[tokio::main]
async fn main() -> Result<(), ScholarflowError> {
	Commandline::parse().run().await
}
