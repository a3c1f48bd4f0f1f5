use std::path::PathBuf;
use tensor_bridge::bridge::{InspectOptions, ReduceOptions};
use tensor_bridge::{Bridge, BridgeConfig, DType, LogicalTensor, OpName, TensorSpec};

fn main() -> anyhow::Result<()> {
    env_logger::init();

    let config = match std::env::args().nth(1) {
        Some(path) => BridgeConfig::from_file(PathBuf::from(path))?,
        None => BridgeConfig::default(),
    }
    .with_env_overrides()?;
    let bridge = Bridge::with_ndarray_engine(config);

    let a = LogicalTensor::from_vec(vec![1i32, 2, 3, 4], vec![2, 2])?;
    let b = LogicalTensor::from_vec(vec![10u8, 20, 30, 40], vec![2, 2])?;
    let sum = bridge.add(&TensorSpec::new(vec![2, 2], DType::I32), &a, &b)?;
    println!("{}", bridge.inspect(&sum, &InspectOptions::default())?);

    let total = bridge.sum(&TensorSpec::new(vec![], DType::I64), &sum, &ReduceOptions::all())?;
    println!("{}", bridge.inspect(&total, &InspectOptions::default())?);

    for t in [&sum, &total] {
        bridge.backend_deallocate(t)?;
    }

    println!("unsupported: {:?}", OpName::unsupported());
    println!("not yet supported: {:?}", OpName::not_yet_supported());
    Ok(())
}
