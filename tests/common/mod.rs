//! Simulated SX127x chips sharing one channel.
//!
//! Each [`Chip`] models the registers the driver touches: the FIFO with its
//! pointer, write-one-to-clear interrupt flags, the mode register and the
//! DIO0 mapping. Time only advances through [`Network::tick`], which the
//! [`Ticks`] delay calls once per millisecond. A transmission started during
//! one tick goes on the air at the next one, so a peer has time to switch to
//! receive before the answer arrives.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::VecDeque;
use std::convert::Infallible;
use std::sync::{Arc, Mutex, MutexGuard};

use embedded_hal::spi::{ErrorKind, ErrorType, Operation, SpiDevice};
use sx127x_link::{Radio, RadioConfig};

const REG_FIFO: u8 = 0x00;
const REG_OP_MODE: u8 = 0x01;
const REG_FIFO_ADDR_PTR: u8 = 0x0D;
const REG_FIFO_TX_BASE_ADDR: u8 = 0x0E;
const REG_FIFO_RX_BASE_ADDR: u8 = 0x0F;
const REG_FIFO_RX_CURRENT_ADDR: u8 = 0x10;
const REG_IRQ_FLAGS: u8 = 0x12;
const REG_RX_NB_BYTES: u8 = 0x13;
const REG_PKT_SNR_VALUE: u8 = 0x19;
const REG_PKT_RSSI_VALUE: u8 = 0x1A;
const REG_PAYLOAD_LENGTH: u8 = 0x22;
const REG_DIO_MAPPING_1: u8 = 0x40;

const MODE_LORA_STANDBY: u8 = 0x81;
const MODE_LORA_TX: u8 = 0x83;
const MODE_LORA_RX_CONTINUOUS: u8 = 0x85;

const IRQ_RX_DONE: u8 = 0x40;
const IRQ_TX_DONE: u8 = 0x08;

pub struct Chip {
    pub regs: [u8; 0x80],
    fifo: [u8; 256],
    fifo_ptr: u8,
    dio0: bool,
    /// Written to PktSnrValue for every received frame
    pub raw_snr: i8,
    /// Written to PktRssiValue for every received frame
    pub raw_rssi: u8,
    /// Value the mode register sticks at regardless of writes
    pub stuck_mode: Option<u8>,
    /// The modem never finishes a transmission
    pub tx_stuck: bool,
    /// SPI writes that would start a transmission fail
    pub refuse_tx: bool,
    /// Writes of the transmit mode
    pub tx_started: usize,
    /// Every frame this chip put on the air
    pub transmitted: Vec<Vec<u8>>,
    pub transactions: usize,
}

impl Chip {
    fn new() -> Self {
        Self {
            regs: [0; 0x80],
            fifo: [0; 256],
            fifo_ptr: 0,
            dio0: false,
            raw_snr: 0,
            raw_rssi: 0,
            stuck_mode: None,
            tx_stuck: false,
            refuse_tx: false,
            tx_started: 0,
            transmitted: Vec::new(),
            transactions: 0,
        }
    }

    pub fn reg(&self, address: u8) -> u8 {
        self.regs[address as usize]
    }

    fn dio0_mapping(&self) -> u8 {
        self.reg(REG_DIO_MAPPING_1) >> 6
    }

    fn write(&mut self, address: u8, value: u8) {
        match address {
            REG_FIFO => {
                self.fifo[self.fifo_ptr as usize] = value;
                self.fifo_ptr = self.fifo_ptr.wrapping_add(1);
            }
            REG_FIFO_ADDR_PTR => {
                self.fifo_ptr = value;
                self.regs[address as usize] = value;
            }
            REG_IRQ_FLAGS => self.regs[address as usize] &= !value,
            REG_OP_MODE => {
                if value == MODE_LORA_TX {
                    self.tx_started += 1;
                }
                self.regs[address as usize] = self.stuck_mode.unwrap_or(value);
            }
            _ => self.regs[address as usize] = value,
        }
    }

    fn read(&mut self, address: u8) -> u8 {
        match address {
            REG_FIFO => {
                let value = self.fifo[self.fifo_ptr as usize];
                self.fifo_ptr = self.fifo_ptr.wrapping_add(1);
                value
            }
            _ => self.reg(address),
        }
    }

    pub fn is_receiving(&self) -> bool {
        self.reg(REG_OP_MODE) == MODE_LORA_RX_CONTINUOUS
    }

    /// Completes a pending transmission and returns the frame sent.
    fn finish_tx(&mut self) -> Option<Vec<u8>> {
        if self.tx_stuck || self.reg(REG_OP_MODE) != MODE_LORA_TX {
            return None;
        }
        let base = self.reg(REG_FIFO_TX_BASE_ADDR);
        let frame: Vec<u8> = (0..self.reg(REG_PAYLOAD_LENGTH))
            .map(|i| self.fifo[base.wrapping_add(i) as usize])
            .collect();

        self.regs[REG_IRQ_FLAGS as usize] |= IRQ_TX_DONE;
        if self.dio0_mapping() == 0b01 {
            self.dio0 = true;
        }
        self.regs[REG_OP_MODE as usize] = MODE_LORA_STANDBY;
        self.transmitted.push(frame.clone());
        Some(frame)
    }

    /// Hands a frame from the air to the modem if it is listening.
    fn deliver(&mut self, frame: &[u8]) {
        if !self.is_receiving() {
            return;
        }
        let base = self.reg(REG_FIFO_RX_BASE_ADDR);
        for (i, byte) in frame.iter().enumerate() {
            self.fifo[base.wrapping_add(i as u8) as usize] = *byte;
        }
        self.regs[REG_FIFO_RX_CURRENT_ADDR as usize] = base;
        self.regs[REG_RX_NB_BYTES as usize] = frame.len() as u8;
        self.regs[REG_PKT_SNR_VALUE as usize] = self.raw_snr as u8;
        self.regs[REG_PKT_RSSI_VALUE as usize] = self.raw_rssi;
        self.regs[REG_IRQ_FLAGS as usize] |= IRQ_RX_DONE;
        if self.dio0_mapping() == 0b00 {
            self.dio0 = true;
        }
    }

    fn take_dio0(&mut self) -> bool {
        std::mem::take(&mut self.dio0)
    }
}

/// Failed transfer reported by [`SimSpi`]
#[derive(Debug)]
pub struct BusFault;

impl embedded_hal::spi::Error for BusFault {
    fn kind(&self) -> ErrorKind {
        ErrorKind::Other
    }
}

/// SPI device in front of a [`Chip`]
pub struct SimSpi(Arc<Mutex<Chip>>);

impl ErrorType for SimSpi {
    type Error = BusFault;
}

impl SpiDevice for SimSpi {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), BusFault> {
        let mut chip = self.0.lock().unwrap();
        chip.transactions += 1;

        let mut address = None;
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => match address {
                    None => address = Some(bytes[0] & 0x7F),
                    Some(start) => {
                        let mut reg = start;
                        for byte in bytes.iter() {
                            if chip.refuse_tx && reg == REG_OP_MODE && *byte == MODE_LORA_TX {
                                return Err(BusFault);
                            }
                            chip.write(reg, *byte);
                            if reg != REG_FIFO {
                                reg += 1;
                            }
                        }
                    }
                },
                Operation::Read(buf) => {
                    let mut reg = address.expect("address byte first");
                    for byte in buf.iter_mut() {
                        *byte = chip.read(reg);
                        if reg != REG_FIFO {
                            reg += 1;
                        }
                    }
                }
                _ => unimplemented!("not used by the driver"),
            }
        }
        Ok(())
    }
}

pub struct Node {
    pub radio: Radio<SimSpi>,
    chip: Arc<Mutex<Chip>>,
}

impl Node {
    pub fn chip(&self) -> MutexGuard<'_, Chip> {
        self.chip.lock().unwrap()
    }
}

type Script = Box<dyn Fn(&[u8]) -> Vec<Vec<u8>>>;

pub struct Network {
    pub nodes: Vec<Node>,
    air: RefCell<VecDeque<Vec<u8>>>,
    script: Option<Script>,
}

impl Network {
    pub fn new(configs: impl IntoIterator<Item = RadioConfig>) -> Self {
        let nodes = configs
            .into_iter()
            .map(|config| {
                let chip = Arc::new(Mutex::new(Chip::new()));
                Node {
                    radio: Radio::new(SimSpi(chip.clone()), config),
                    chip,
                }
            })
            .collect();
        Self {
            nodes,
            air: RefCell::new(VecDeque::new()),
            script: None,
        }
    }

    /// One node per address, default settings otherwise.
    pub fn with_addresses(addresses: &[u8]) -> Self {
        Self::new(addresses.iter().map(|&address| RadioConfig {
            address,
            ..Default::default()
        }))
    }

    /// Adds a scripted peer: every frame that goes on the air is passed to
    /// `script`, and the frames it returns are sent one per tick afterwards.
    pub fn respond_with(mut self, script: impl Fn(&[u8]) -> Vec<Vec<u8>> + 'static) -> Self {
        self.script = Some(Box::new(script));
        self
    }

    pub fn init(&self) {
        for node in &self.nodes {
            node.radio.init(&mut self.ticks()).unwrap();
        }
    }

    pub fn ticks(&self) -> Ticks<'_> {
        Ticks {
            network: self,
            elapsed_ms: 0,
        }
    }

    /// Queues a raw frame; it is delivered at the next tick.
    pub fn inject(&self, frame: &[u8]) {
        self.air.borrow_mut().push_back(frame.to_vec());
    }

    /// Queues a raw frame and runs one tick.
    pub fn inject_now(&self, frame: &[u8]) {
        self.inject(frame);
        self.tick();
    }

    pub fn tick(&self) {
        let queued = self.air.borrow_mut().pop_front();
        if let Some(frame) = queued {
            self.deliver(&frame);
        }

        let finished: Vec<Vec<u8>> = self
            .nodes
            .iter()
            .filter_map(|node| node.chip().finish_tx())
            .collect();
        for frame in &finished {
            self.deliver(frame);
            if let Some(script) = &self.script {
                self.air.borrow_mut().extend(script(frame));
            }
        }

        for node in &self.nodes {
            let fired = node.chip().take_dio0();
            if fired {
                node.radio.on_interrupt().unwrap();
            }
        }
    }

    fn deliver(&self, frame: &[u8]) {
        for node in &self.nodes {
            node.chip().deliver(frame);
        }
    }
}

/// Delay that advances the network one tick per millisecond.
pub struct Ticks<'a> {
    network: &'a Network,
    pub elapsed_ms: u32,
}

impl Ticks<'_> {
    fn advance(&mut self, ms: u32) {
        for _ in 0..ms {
            self.network.tick();
            self.elapsed_ms += 1;
        }
    }
}

impl embedded_hal::delay::DelayNs for Ticks<'_> {
    fn delay_ns(&mut self, ns: u32) {
        self.advance(ns.div_ceil(1_000_000));
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(ms);
    }
}

/// Yields to the executor after every delay so concurrent tasks interleave.
impl embedded_hal_async::delay::DelayNs for Ticks<'_> {
    async fn delay_ns(&mut self, ns: u32) {
        self.advance(ns.div_ceil(1_000_000));
        tokio::task::yield_now().await;
    }

    async fn delay_ms(&mut self, ms: u32) {
        self.advance(ms);
        tokio::task::yield_now().await;
    }
}

/// Output pin that records every level it is driven to.
#[derive(Default)]
pub struct RecordingPin {
    pub levels: Vec<bool>,
}

impl embedded_hal::digital::ErrorType for RecordingPin {
    type Error = Infallible;
}

impl embedded_hal::digital::OutputPin for RecordingPin {
    fn set_low(&mut self) -> Result<(), Infallible> {
        self.levels.push(false);
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Infallible> {
        self.levels.push(true);
        Ok(())
    }
}

/// Answers every data frame with an acknowledgement for `id_offset` past
/// its sequence id.
pub fn acknowledge(id_offset: u8) -> impl Fn(&[u8]) -> Vec<Vec<u8>> {
    move |frame| {
        if frame[3] & 0x80 != 0 {
            return Vec::new();
        }
        vec![vec![frame[1], frame[0], frame[2].wrapping_add(id_offset), 0x80]]
    }
}
