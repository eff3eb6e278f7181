//! Output device enumeration and lookup
//!
//! Devices are listed from every available cpal host (ALSA, JACK, PulseAudio,
//! CoreAudio, WASAPI, ...) so a configuration can pin both the device and the
//! host it lives on.

use cpal::traits::{DeviceTrait, HostTrait};
use cpal::{Device, Host, HostId};

use super::config::DeviceId;
use super::error::{AudioError, AudioResult};

/// Sample rates probed against each device's supported ranges
const COMMON_SAMPLE_RATES: [u32; 6] = [44100, 48000, 88200, 96000, 176400, 192000];

/// Display name for a host
fn host_name(host_id: HostId) -> String {
    let name = format!("{:?}", host_id);
    match name.as_str() {
        "Alsa" => "ALSA".to_string(),
        "Jack" => "JACK".to_string(),
        "Wasapi" => "WASAPI".to_string(),
        _ => name,
    }
}

/// Every host that can be opened on this machine, with its display name
fn available_hosts() -> impl Iterator<Item = (String, Host)> {
    cpal::available_hosts()
        .into_iter()
        .filter_map(|host_id| match cpal::host_from_id(host_id) {
            Ok(host) => Some((host_name(host_id), host)),
            Err(e) => {
                log::debug!("Could not open host {:?}: {}", host_id, e);
                None
            }
        })
}

/// An output device and what it supports
#[derive(Debug, Clone)]
pub struct AudioDevice {
    /// Identifier to put in the configuration
    pub id: DeviceId,
    /// Whether this is its host's default output
    pub is_default: bool,
    /// Common sample rates inside the device's supported ranges
    pub sample_rates: Vec<u32>,
    /// Maximum output channels
    pub max_channels: u16,
}

impl std::fmt::Display for AudioDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.id.display_label())?;
        if self.is_default {
            write!(f, " (default)")?;
        }
        Ok(())
    }
}

/// Describe one device, or None if it cannot report a name or any format
fn describe(device: &Device, host: &str, default_name: Option<&str>) -> Option<AudioDevice> {
    let name = device.name().ok()?;
    let configs: Vec<_> = device.supported_output_configs().ok()?.collect();
    if configs.is_empty() {
        return None;
    }

    let max_channels = configs.iter().map(|c| c.channels()).max().unwrap_or(0);
    let mut sample_rates: Vec<u32> = COMMON_SAMPLE_RATES
        .into_iter()
        .filter(|&rate| {
            configs
                .iter()
                .any(|c| rate >= c.min_sample_rate().0 && rate <= c.max_sample_rate().0)
        })
        .collect();
    sample_rates.sort_unstable();

    Some(AudioDevice {
        is_default: default_name == Some(name.as_str()),
        id: DeviceId::with_host(name, host),
        sample_rates,
        max_channels,
    })
}

/// List output devices from all hosts, defaults first
pub fn get_output_devices() -> AudioResult<Vec<AudioDevice>> {
    let mut devices = Vec::new();

    for (host_label, host) in available_hosts() {
        let default_name = host.default_output_device().and_then(|d| d.name().ok());
        let outputs = match host.output_devices() {
            Ok(outputs) => outputs,
            Err(e) => {
                log::debug!("Could not enumerate devices for {}: {}", host_label, e);
                continue;
            }
        };
        devices.extend(
            outputs.filter_map(|device| describe(&device, &host_label, default_name.as_deref())),
        );
    }

    if devices.is_empty() {
        return Err(AudioError::NoDevices);
    }

    devices.sort_by(|a, b| {
        b.is_default
            .cmp(&a.is_default)
            .then_with(|| a.id.host.cmp(&b.id.host))
            .then_with(|| a.id.name.cmp(&b.id.name))
    });

    log::info!("Enumerated {} audio output devices", devices.len());
    Ok(devices)
}

/// Find a cpal device by its configured id
///
/// Searches only the named host if the id has one, otherwise every host.
pub fn find_device_by_id(id: &DeviceId) -> AudioResult<Device> {
    for (host_label, host) in available_hosts() {
        if id.host.as_deref().is_some_and(|wanted| wanted != host_label) {
            continue;
        }
        let found = host
            .output_devices()?
            .find(|d| d.name().ok().as_deref() == Some(id.name.as_str()));
        if let Some(device) = found {
            return Ok(device);
        }
    }
    Err(AudioError::DeviceNotFound(id.display_label()))
}

/// The default output device of the default host
pub fn default_output_device() -> AudioResult<Device> {
    let host = cpal::default_host();
    host.default_output_device()
        .ok_or_else(|| AudioError::NoDefaultDevice(host_name(host.id())))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_names() {
        for host_id in cpal::available_hosts() {
            assert!(!host_name(host_id).is_empty());
        }
    }

    #[test]
    fn test_device_enumeration() {
        // Machines without sound hardware (CI) legitimately have no devices
        match get_output_devices() {
            Ok(devices) => {
                for device in &devices {
                    assert!(device.max_channels > 0);
                    assert!(device.id.host.is_some());
                }
            }
            Err(AudioError::NoDevices) => {}
            Err(e) => panic!("unexpected enumeration error: {}", e),
        }
    }

    #[test]
    fn test_unknown_device_not_found() {
        let id = DeviceId::with_host("no such device", "NoSuchHost");
        assert!(matches!(
            find_device_by_id(&id),
            Err(AudioError::DeviceNotFound(_))
        ));
    }
}
