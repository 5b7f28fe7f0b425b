use cpal::traits::{DeviceTrait, HostTrait};
use cpal::Device;
use voice_core::AudioError;

fn get_host() -> cpal::Host {
    cpal::default_host()
}

fn find_named(devices: impl Iterator<Item = Device>, target: &str) -> Option<Device> {
    devices
        .into_iter()
        .find(|device| device.name().is_ok_and(|name| name == target))
}

/// Returns the named input device, or the host default when no name is given.
pub fn get_or_default_input(device_name: Option<&str>) -> Result<Device, AudioError> {
    let host = get_host();
    tracing::debug!("Host: {:?}", host.id());
    match device_name {
        None => host.default_input_device().ok_or(AudioError::NoInputDevice),
        Some(target) => {
            let devices = host
                .input_devices()
                .map_err(|e| AudioError::Stream(e.to_string()))?;
            find_named(devices, target).ok_or(AudioError::NoInputDevice)
        }
    }
}

/// Same as [`get_or_default_input`] for output devices.
pub fn get_or_default_output(device_name: Option<&str>) -> Result<Device, AudioError> {
    let host = get_host();
    match device_name {
        None => host.default_output_device().ok_or(AudioError::NoOutputDevice),
        Some(target) => {
            let devices = host
                .output_devices()
                .map_err(|e| AudioError::Stream(e.to_string()))?;
            find_named(devices, target).ok_or(AudioError::NoOutputDevice)
        }
    }
}

fn describe(name: &str, channels: Option<u16>, sample_rate: Option<u32>, is_default: bool) -> String {
    let mut line = match (channels, sample_rate) {
        (Some(ch), Some(rate)) => format!(" * {}({}ch, {}hz)", name, ch, rate),
        _ => format!(" * {}(no default config)", name),
    };
    if is_default {
        line.push_str(" [default]");
    }
    line
}

/// One line per input device with its default channel count and rate.
pub fn get_available_inputs() -> anyhow::Result<String> {
    for host in cpal::available_hosts() {
        tracing::debug!("Available host: {:?}", host);
    }

    let host = get_host();
    let default_device = host.default_input_device().and_then(|d| d.name().ok());

    let mut device_names = Vec::new();
    for device in host.input_devices()? {
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        let config = device.default_input_config().ok();
        device_names.push(describe(
            &name,
            config.as_ref().map(|c| c.channels()),
            config.as_ref().map(|c| c.sample_rate().0),
            default_device.as_deref() == Some(name.as_str()),
        ));
    }
    Ok(device_names.join("\n"))
}

pub fn get_available_outputs() -> anyhow::Result<String> {
    let host = get_host();
    let default_device = host.default_output_device().and_then(|d| d.name().ok());

    let mut device_names = Vec::new();
    for device in host.output_devices()? {
        let name = device.name().unwrap_or_else(|_| "<unnamed>".to_string());
        let config = device.default_output_config().ok();
        device_names.push(describe(
            &name,
            config.as_ref().map(|c| c.channels()),
            config.as_ref().map(|c| c.sample_rate().0),
            default_device.as_deref() == Some(name.as_str()),
        ));
    }
    Ok(device_names.join("\n"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_marks_default_device() {
        assert_eq!(
            describe("USB Mic", Some(1), Some(48000), true),
            " * USB Mic(1ch, 48000hz) [default]"
        );
        assert_eq!(describe("HDMI", None, None, false), " * HDMI(no default config)");
    }
}
