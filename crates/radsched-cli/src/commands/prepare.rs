//! Prepare command - register a function locally and with the registration service.

use radsched_placement::store::file::DataDir;
use radsched_placement::store::FunctionRegistry;
use radsched_placement::types::parse_execution_time;
use radsched_placement::{FunctionDescriptor, PlacementError, RegisteredFunction, SchedulerConfig};
use thiserror::Error;

use crate::client::{ClientError, RegistryClient, DEFAULT_FUNCTION_URL};

#[derive(Error, Debug)]
pub enum PrepareError {
    #[error("Function name must not be empty")]
    EmptyName,

    #[error("Invalid execution time: {0}")]
    InvalidExecutionTime(String),

    #[error("Registration failed: {0}")]
    Registration(#[from] ClientError),

    #[error(transparent)]
    Placement(#[from] PlacementError),
}

pub struct PrepareArgs {
    pub name: String,
    pub execution_time: String,
    pub datacenter: String,
}

pub async fn run(config: &SchedulerConfig, args: PrepareArgs) -> Result<(), PrepareError> {
    let descriptor = descriptor(&args)?;

    let replaced = save_locally(&DataDir::new(&config.store.data_dir), descriptor.clone())?;
    if replaced {
        println!("Function '{}' updated in the local registry.", descriptor.name());
    } else {
        println!("Function '{}' added to the local registry.", descriptor.name());
    }

    let client = RegistryClient::new(&config.registry)?;
    client.register(&RegisteredFunction::from(&descriptor)).await?;
    println!("Function '{}' registered.", descriptor.name());

    Ok(())
}

fn descriptor(args: &PrepareArgs) -> Result<FunctionDescriptor, PrepareError> {
    if args.name.trim().is_empty() {
        return Err(PrepareError::EmptyName);
    }

    let ms = parse_execution_time(&args.execution_time).map_err(PrepareError::InvalidExecutionTime)?;
    Ok(FunctionDescriptor::new(&args.name, ms, &args.datacenter).with_url(DEFAULT_FUNCTION_URL))
}

/// Inserts or replaces the function in the local registry.
fn save_locally(data: &DataDir, descriptor: FunctionDescriptor) -> Result<bool, PrepareError> {
    Ok(data.function_registry().upsert(descriptor)?)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn args(name: &str, time: &str) -> PrepareArgs {
        PrepareArgs {
            name: name.to_owned(),
            execution_time: time.to_owned(),
            datacenter: "US-West-1".to_owned(),
        }
    }

    #[test]
    fn descriptor_is_normalised() {
        let descriptor = descriptor(&args("Function3", "125ms")).unwrap();
        assert_eq!(descriptor.name(), "function3");
        assert_eq!(descriptor.home_datacenter(), "us-west-1");
        assert_eq!(descriptor.url(), Some(DEFAULT_FUNCTION_URL));

        let entry = RegisteredFunction::from(&descriptor);
        assert_eq!(entry.execution_time, "125ms");
    }

    #[test]
    fn bad_input_is_rejected() {
        assert!(matches!(
            descriptor(&args("f", "quick")),
            Err(PrepareError::InvalidExecutionTime(_))
        ));
        assert!(matches!(descriptor(&args("  ", "10ms")), Err(PrepareError::EmptyName)));
    }

    #[test]
    fn save_locally_reports_replacement() {
        let dir = tempfile::tempdir().unwrap();
        let data = DataDir::new(dir.path());

        assert!(!save_locally(&data, descriptor(&args("f1", "100ms")).unwrap()).unwrap());
        assert!(save_locally(&data, descriptor(&args("F1", "200ms")).unwrap()).unwrap());

        let stored = data.function_registry().get("f1").unwrap();
        assert!((stored.base_execution_time_ms() - 200.0).abs() < f64::EPSILON);
    }
}
