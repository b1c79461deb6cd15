//! Code option command implementation

use hidflash_core::{write_code_option, CodeOptionConsent};

use super::{flash_config, open_device, CommandError};
use crate::cli::DeviceArgs;

/// Write the code option words after an explicit confirmation
pub fn run_write_code_option(
    device: &DeviceArgs,
    words: &[u32],
    confirmed: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    if !confirmed {
        return Err(Box::new(CommandError::CodeOptionNotConfirmed));
    }

    let mut dev = open_device(device)?;
    let consent = CodeOptionConsent::i_understand_this_may_erase_the_chip();
    write_code_option(&mut dev, words, consent, &flash_config(device))?;

    println!("Code option written ({} words)", words.len());
    Ok(())
}
