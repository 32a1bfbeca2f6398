//! Run command - choose where a registered function should execute.

use radsched_placement::store::file::DataDir;
use radsched_placement::{
    PlacementEngine, PlacementError, PlacementMode, PlacementResult, SchedulerConfig,
};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum RunError {
    #[error("Function {0} is unknown. Prepare it before running")]
    UnknownFunction(String),

    #[error(transparent)]
    Placement(PlacementError),
}

impl From<PlacementError> for RunError {
    fn from(err: PlacementError) -> Self {
        match err {
            PlacementError::FunctionNotFound(name) => Self::UnknownFunction(name),
            other => Self::Placement(other),
        }
    }
}

pub struct RunArgs {
    pub name: String,
    pub with_weight: bool,
    pub seed: Option<u64>,
}

pub async fn run(config: SchedulerConfig, args: RunArgs) -> Result<(), RunError> {
    let result = place(config, &args)?;

    println!("Function Name: {}", args.name.to_lowercase());
    println!("Optimal Location: {}", result.chosen_site);
    println!("Execution Time: {:.3} ms", result.predicted_execution_time_ms);
    println!("Decision: {}", result.decision.as_str());

    Ok(())
}

fn place(mut config: SchedulerConfig, args: &RunArgs) -> Result<PlacementResult, RunError> {
    if args.seed.is_some() {
        config.exploration.seed = args.seed;
    }

    let mode = if args.with_weight {
        PlacementMode::Weighted
    } else {
        PlacementMode::Unweighted
    };

    let engine = PlacementEngine::from_data_dir(&config)?;
    let registry = DataDir::new(&config.store.data_dir).function_registry();
    Ok(engine.place_by_name(&registry, &args.name, mode)?)
}
