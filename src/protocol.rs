use anyhow::{bail, Context, Result};
use log::{debug, info, warn};
use std::io::{BufRead, BufReader, ErrorKind, Read};
use std::time::Duration;

use crate::telegram::{parse_field, Telegram};

pub const DATA_BITS: serialport::DataBits = serialport::DataBits::Eight;
pub const PARITY: serialport::Parity = serialport::Parity::None;
pub const STOP_BITS: serialport::StopBits = serialport::StopBits::One;

/// Longest accepted line, newline included. Leaves room for a 1024
/// character text message sent hex-encoded.
pub const MAX_LINE_LEN: usize = 4096;

/// Holds an open P1 port. The meter pushes a telegram on its own schedule,
/// so reading is just waiting for the next `/` header.
pub struct P1Connection {
    reader: BufReader<Box<dyn serialport::SerialPort>>,
}

impl P1Connection {
    pub fn open(path: &str, baud_rate: u32, timeout: Duration) -> Result<Self> {
        info!("Opening {} at {} baud", path, baud_rate);
        let port = serialport::new(path, baud_rate)
            .data_bits(DATA_BITS)
            .parity(PARITY)
            .stop_bits(STOP_BITS)
            .timeout(timeout)
            .open()
            .with_context(|| format!("Failed to open serial port {}", path))?;

        Ok(Self {
            reader: BufReader::new(port),
        })
    }

    /// Block until the next complete telegram has been received.
    pub fn read(&mut self) -> Result<Telegram> {
        read_telegram(&mut self.reader)
    }
}

/// Read one telegram: skip input up to a `/` identification line, collect
/// data lines up to the `!` trailer and check the CRC if the trailer has one.
/// Read timeouts are not errors; the meter is simply quiet between telegrams.
pub fn read_telegram(reader: &mut impl BufRead) -> Result<Telegram> {
    let mut telegram: Option<Telegram> = None;
    let mut crc = 0u16;
    let mut line = Vec::new();

    loop {
        if line.len() >= MAX_LINE_LEN {
            bail!("P1 line exceeds {} bytes without a newline", MAX_LINE_LEN);
        }
        let remaining = (MAX_LINE_LEN - line.len()) as u64;
        match reader.by_ref().take(remaining).read_until(b'\n', &mut line) {
            Ok(0) => bail!("P1 port returned EOF before complete telegram"),
            Ok(_) => {}
            Err(e) if matches!(e.kind(), ErrorKind::TimedOut | ErrorKind::Interrupted) => continue,
            Err(e) => return Err(e).context("Failed to read line from P1 port"),
        }

        if line.len() >= MAX_LINE_LEN && !line.ends_with(b"\n") {
            bail!("P1 line exceeds {} bytes without a newline", MAX_LINE_LEN);
        }

        let raw = std::mem::take(&mut line);
        let text = String::from_utf8_lossy(&raw);
        let trimmed = text.trim();
        debug!("P1: {}", trimmed);

        // Identification line, (re)starts a telegram
        if let Some(start) = raw
            .iter()
            .position(|&b| b == b'/')
            .filter(|_| trimmed.starts_with('/'))
        {
            crc = crc16(0, &raw[start..]);
            telegram = Some(Telegram {
                header: String::from_utf8_lossy(&raw[start + 1..]).trim().to_string(),
                fields: Vec::new(),
            });
            continue;
        }

        let Some(current) = telegram.as_mut() else {
            continue;
        };

        if let Some(end) = raw
            .iter()
            .position(|&b| b == b'!')
            .filter(|_| trimmed.starts_with('!'))
        {
            crc = crc16(crc, &raw[..=end]);
            let checksum = trimmed.trim_start_matches('!');
            if !checksum.is_empty() {
                let expected = u16::from_str_radix(checksum, 16)
                    .with_context(|| format!("Malformed telegram CRC {:?}", checksum))?;
                if expected != crc {
                    warn!("Discarding telegram from {}", current.header);
                    bail!(
                        "Telegram CRC mismatch: expected {:04X}, computed {:04X}",
                        expected,
                        crc
                    );
                }
            }
            break;
        }

        crc = crc16(crc, &raw);
        if let Some(field) = parse_field(trimmed) {
            current.fields.push(field);
        }
    }

    let telegram = telegram.unwrap_or_default();
    debug!(
        "Telegram from {} with {} fields",
        telegram.header,
        telegram.fields.len()
    );
    Ok(telegram)
}

/// CRC-16/ARC (polynomial 0xA001 reflected, initial value 0).
fn crc16(mut crc: u16, data: &[u8]) -> u16 {
    for &byte in data {
        crc ^= u16::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xA001
            } else {
                crc >> 1
            };
        }
    }
    crc
}
