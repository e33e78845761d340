//! Load-address correction.
//!
//! Some dialects record frames relative to the binary's build-time load
//! address while reporting the relocated ("slid") address separately. Before
//! per-address lookup can work, frames of the exact shape "anonymous frame
//! at the image's own base address" must have their static offset folded
//! into the address. Nothing broader than that shape is touched.

use crate::report::{hex_to_u64, Binary, Frame};

impl Frame {
    /// Return a corrected copy of this frame, or an identical one.
    ///
    /// A frame is corrected only when its address equals `load_address`
    /// (compared as integers) and its symbol is an anonymous offset
    /// annotation of the form `+ <decimal>`. The offset is added to the
    /// address and the symbol reset to `+ 0`.
    pub fn fixed(&self, load_address: &str) -> Frame {
        let (Some(address), Some(load)) = (hex_to_u64(&self.address), hex_to_u64(load_address))
        else {
            return self.clone();
        };
        let Some(symbol) = self.symbol.as_deref() else {
            return self.clone();
        };
        if address != load || !symbol.starts_with('+') {
            return self.clone();
        }

        let Some(offset) = symbol.split_whitespace().nth(1) else {
            return self.clone();
        };
        let Ok(offset) = offset.parse::<u64>() else {
            return self.clone();
        };
        let Some(corrected) = address.checked_add(offset) else {
            return self.clone();
        };

        let mut fixed = self.clone();
        fixed.address = format!("0x{corrected:016x}");
        fixed.symbol = Some("+ 0".to_string());
        fixed
    }
}

impl Binary {
    /// Apply load-address correction to every extracted frame.
    pub fn fix(&mut self) {
        let Some(load_address) = self.load_address.clone() else {
            return;
        };
        if let Some(backtrace) = self.backtrace.as_mut() {
            for frame in backtrace.iter_mut() {
                *frame = frame.fixed(&load_address);
            }
        }
    }
}
