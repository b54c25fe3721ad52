// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Terminal prompts: device picker and adapter power-on.

use anyhow::{bail, Result};
use std::io::Write;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tracing::warn;

use crate::bluetooth::{AdapterError, Address, DeviceSelector};

/// Numbered list of paired devices, marking `default` with `*`.
pub fn render_list(selector: &DeviceSelector, default: Option<Address>) -> String {
    if selector.is_empty() {
        return "No paired devices. Pair the board with bluetoothctl first.".to_string();
    }

    let mut out = String::from("Paired devices:");
    for (i, device) in selector.list().iter().enumerate() {
        let marker = if Some(device.address) == default { " *" } else { "" };
        out.push_str(&format!("\n  {}) {}{}", i + 1, device, marker));
    }
    out
}

/// Resolve picker input, falling back to `default` on a blank line.
pub fn resolve(selector: &DeviceSelector, input: &str, default: Option<Address>) -> Option<Address> {
    if input.trim().is_empty() {
        return default.filter(|address| selector.position(*address).is_some());
    }
    selector.select(input)
}

/// Ask the user to choose a device. `None` aborts the connect flow.
pub async fn pick_device<R>(
    selector: &DeviceSelector,
    default: Option<Address>,
    lines: &mut Lines<R>,
) -> Result<Option<Address>>
where
    R: AsyncBufRead + Unpin,
{
    println!("{}", render_list(selector, default));
    if selector.is_empty() {
        return Ok(None);
    }

    match default.and_then(|address| selector.position(address)) {
        Some(position) => print!("Choose a device [{position}]: "),
        None => print!("Choose a device: "),
    }
    std::io::stdout().flush()?;

    let Some(input) = lines.next_line().await? else {
        return Ok(None);
    };

    let choice = resolve(selector, &input, default);
    if choice.is_none() && !input.trim().is_empty() {
        println!("No device matches '{}'", input.trim());
    }
    Ok(choice)
}

/// Decide whether to power the adapter on after the power check failed.
///
/// Only a powered-off adapter is recoverable. Unless `assume_yes` is set the
/// user is asked, and any answer other than yes aborts.
pub async fn confirm_power_on<R>(
    error: AdapterError,
    assume_yes: bool,
    lines: &mut Lines<R>,
) -> Result<()>
where
    R: AsyncBufRead + Unpin,
{
    let name = match error {
        AdapterError::PoweredOff(name) => name,
        other => return Err(other.into()),
    };
    warn!("Adapter {} is powered off", name);

    if assume_yes {
        return Ok(());
    }

    print!("Bluetooth is off. Turn it on? [y/N] ");
    std::io::stdout().flush()?;
    let answer = lines.next_line().await?.unwrap_or_default();
    if !matches!(answer.trim().to_lowercase().as_str(), "y" | "yes") {
        bail!("Bluetooth is not enabled");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bluetooth::RemoteDevice;

    fn selector() -> DeviceSelector {
        DeviceSelector::new(vec![
            RemoteDevice {
                address: Address::new([0, 0, 0, 0, 0, 1]),
                name: "HC-05".to_string(),
            },
            RemoteDevice {
                address: Address::new([0, 0, 0, 0, 0, 2]),
                name: "Relay board".to_string(),
            },
        ])
    }

    #[test]
    fn test_render_marks_default() {
        let text = render_list(&selector(), Some(Address::new([0, 0, 0, 0, 0, 2])));
        assert_eq!(
            text,
            "Paired devices:\n  1) HC-05 (00:00:00:00:00:01)\n  2) Relay board (00:00:00:00:00:02) *"
        );
        assert!(render_list(&DeviceSelector::default(), None).starts_with("No paired devices"));
    }

    #[test]
    fn test_blank_input_uses_default() {
        let default = Some(Address::new([0, 0, 0, 0, 0, 2]));
        assert_eq!(resolve(&selector(), "", default), default);
        assert_eq!(resolve(&selector(), "", None), None);
        // A remembered device that is no longer paired is not offered
        assert_eq!(
            resolve(&selector(), "", Some(Address::new([9, 9, 9, 9, 9, 9]))),
            None
        );
        assert_eq!(
            resolve(&selector(), "1", default),
            Some(Address::new([0, 0, 0, 0, 0, 1]))
        );
    }

    #[tokio::test]
    async fn test_pick_from_input() {
        let input: &[u8] = b"2\n";
        let mut lines = input.lines();
        let choice = pick_device(&selector(), None, &mut lines).await.unwrap();
        assert_eq!(choice, Some(Address::new([0, 0, 0, 0, 0, 2])));

        let input: &[u8] = b"";
        let mut lines = input.lines();
        assert_eq!(pick_device(&selector(), None, &mut lines).await.unwrap(), None);
    }

    fn powered_off() -> AdapterError {
        AdapterError::PoweredOff("hci0".to_string())
    }

    #[tokio::test]
    async fn test_power_prompt_declined() {
        let input: &[u8] = b"n\n";
        let err = confirm_power_on(powered_off(), false, &mut input.lines())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not enabled"));

        // Closed input counts as no
        let input: &[u8] = b"";
        assert!(confirm_power_on(powered_off(), false, &mut input.lines())
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_power_prompt_accepted() {
        let input: &[u8] = b" Y\n";
        confirm_power_on(powered_off(), false, &mut input.lines())
            .await
            .unwrap();

        let input: &[u8] = b"";
        confirm_power_on(powered_off(), true, &mut input.lines())
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_missing_adapter_is_fatal() {
        let input: &[u8] = b"y\n";
        let err = confirm_power_on(
            AdapterError::Unavailable("no adapter".to_string()),
            true,
            &mut input.lines(),
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("no adapter"));
    }
}
