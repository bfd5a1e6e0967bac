use anyhow::{bail, Result};
use candle_core::utils::{cuda_is_available, metal_is_available};
use candle_core::Device;
use hf_hub::api::sync::{Api, ApiRepo};
use hf_hub::{Repo, RepoType};

use crate::common::DeviceSelector;

pub fn device(selector: DeviceSelector) -> Result<Device> {
    match selector {
        DeviceSelector::Cpu => Ok(Device::Cpu),
        DeviceSelector::Accelerator(ordinal) => {
            if cuda_is_available() {
                Ok(Device::new_cuda(ordinal)?)
            } else if metal_is_available() {
                Ok(Device::new_metal(ordinal)?)
            } else {
                bail!("accelerator {ordinal} requested but this build has no CUDA or Metal support")
            }
        }
    }
}

/// Hub repo for `model_id`, pinned to `revision` when given.
pub fn hub_repo(model_id: &str, revision: Option<&str>) -> Result<ApiRepo> {
    let api = Api::new()?;
    let repo = match revision {
        Some(revision) => Repo::with_revision(
            model_id.to_string(),
            RepoType::Model,
            revision.to_string(),
        ),
        None => Repo::model(model_id.to_string()),
    };
    Ok(api.repo(repo))
}
