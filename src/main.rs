use drover::error::DroverError;
use drover::ui::Ui;
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_env("DROVER_LOG").unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .without_time()
        .init();

    if let Err(e) = drover::cli::run() {
        let code = match e.downcast_ref::<DroverError>() {
            // Failed commands were already announced by the executor
            Some(err @ DroverError::Execution(_)) => err.exit_code(),
            Some(err) => {
                Ui::default().print_error(err);
                err.exit_code()
            }
            None => {
                Ui::default().print_error(&e);
                1
            }
        };
        process::exit(code);
    }
}
