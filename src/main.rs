use registry_viewer::ViewerConfig;
use registry_viewer::cli::{Args, Runner};
use std::process;

#[tokio::main]
async fn main() {
    let args = Args::parse_args();
    let config = args.to_config(ViewerConfig::from_env());
    let runner = Runner::new(args, config);

    if let Err(e) = runner.run().await {
        runner.logger().error(&e.to_string());
        process::exit(1);
    }
}
