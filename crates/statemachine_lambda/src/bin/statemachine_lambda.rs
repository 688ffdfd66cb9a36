use lambda_runtime::Error;
use statemachine_core::invoker::InvocationMode;
use statemachine_lambda::runtime::run_workflow;

#[tokio::main]
async fn main() -> Result<(), Error> {
    run_workflow(InvocationMode::Bare, "statemachine_lambda").await
}
