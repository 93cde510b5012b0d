//! Addressed, acknowledged packet delivery on top of the SX127x
//!
//! [`Radio`] owns the register transport and all state shared between the
//! application and the DIO0 interrupt handler. Every method takes `&self`;
//! state lives behind a [`critical_section::Mutex`], and any sequence of
//! register accesses that must not be split by the interrupt runs inside a
//! single critical section. Polling loops release it between polls so the
//! interrupt can make progress.
//!
//! # Interrupt wiring
//! The application configures DIO0 as a rising-edge interrupt and calls
//! [`Radio::on_interrupt`] from its handler:
//!
//! ```ignore
//! #[interrupt]
//! fn IO_IRQ_BANK0() {
//!     clear_dio0_edge();
//!     let _ = RADIO.get().on_interrupt();
//! }
//! ```
//!
//! # Delivery
//! Accepted data packets are pushed into a bounded queue drained with
//! [`Radio::receive`]. A handler registered with [`Radio::on_receive`] is also
//! called, from interrupt context, for every accepted packet.

use core::cell::RefCell;

use critical_section::Mutex;
use embedded_hal::delay::DelayNs;
use embedded_hal::digital::OutputPin;
use embedded_hal::spi::SpiDevice;
use heapless::Deque;
use regiface::Register;

use crate::config::{self, ModemPreset, RadioConfig, PREAMBLE_SYMBOLS};
use crate::device::Device;
use crate::mode::{Mode, ModeController};
use crate::packet::{
    self, Flags, Header, Packet, SignalQuality, BROADCAST_ADDRESS, HEADER_LEN, MAX_FRAME_LEN,
    MAX_PAYLOAD_LEN,
};
use crate::registers::{
    FifoAddrPtr, FifoRxBaseAddr, FifoRxCurrentAddr, FifoTxBaseAddr, Interrupts, IrqFlags,
    ModemConfig1, ModemConfig2, ModemConfig3, PayloadLength, PktRssiValue, PktSnrValue,
    PreambleLength, RxNbBytes,
};
use crate::Error;

/// Number of received packets buffered for [`Radio::receive`]
pub const RX_QUEUE_DEPTH: usize = 4;

/// Upper bound on waiting for TxDone, independent of the caller's timeout
pub const TX_COMPLETE_TIMEOUT_MS: u32 = 500;

/// Interval between polls of the shared state while waiting
pub const POLL_INTERVAL_MS: u32 = 1;

const RESET_PULSE_MS: u32 = 10;
const TX_BASE_ADDRESS: u8 = 0x00;
const RX_BASE_ADDRESS: u8 = 0x00;

/// Handler invoked from interrupt context for every accepted data packet
pub type ReceiveHandler = fn(&Packet);

/// Reception counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct RxStats {
    /// Accepted data packets
    pub packets: u32,
    /// RSSI of the last accepted data packet, in dBm
    pub last_rssi: i16,
    /// Packets dropped because the receive queue was full
    pub overruns: u32,
}

/// Acknowledgement bookkeeping for [`Radio::send_and_wait`]
#[derive(Debug, Default)]
struct AckWait {
    /// A send-and-wait is in progress
    active: bool,
    /// Set by the interrupt handler, cleared by the waiter
    received: bool,
    last_ack: Option<Packet>,
}

struct Inner<SPI> {
    device: Device<SPI>,
    modes: ModeController,
    config: RadioConfig,
    sequence: u8,
    ack: AckWait,
    queue: Deque<Packet, RX_QUEUE_DEPTH>,
    stats: RxStats,
    handler: Option<ReceiveHandler>,
}

/// SX127x LoRa packet radio
pub struct Radio<SPI> {
    inner: Mutex<RefCell<Inner<SPI>>>,
}

/// Holds the send-and-wait slot; released on drop, including when an async
/// send is cancelled mid-wait.
struct WaitGuard<'a, SPI> {
    radio: &'a Radio<SPI>,
    id: u8,
}

impl<SPI> Drop for WaitGuard<'_, SPI> {
    fn drop(&mut self) {
        self.radio.with(|inner| {
            inner.ack.active = false;
            inner.ack.received = false;
        });
    }
}

impl<SPI> Radio<SPI> {
    /// Creates the driver. The chip is not touched until [`Radio::init`].
    pub fn new(spi: SPI, config: RadioConfig) -> Self {
        Self {
            inner: Mutex::new(RefCell::new(Inner {
                device: Device::new(spi),
                modes: ModeController::new(),
                config,
                sequence: 0,
                ack: AckWait::default(),
                queue: Deque::new(),
                stats: RxStats::default(),
                handler: None,
            })),
        }
    }

    /// Releases the SPI device. GPIO state is left as is.
    pub fn release(self) -> SPI {
        self.inner.into_inner().into_inner().device.release()
    }

    fn with<R>(&self, f: impl FnOnce(&mut Inner<SPI>) -> R) -> R {
        critical_section::with(|cs| f(&mut self.inner.borrow_ref_mut(cs)))
    }

    /// Current configuration, including changes made through the setters
    pub fn config(&self) -> RadioConfig {
        self.with(|inner| inner.config)
    }

    /// Cached operating mode; `None` before init or after a reset
    pub fn mode(&self) -> Option<Mode> {
        self.with(|inner| inner.modes.current())
    }

    /// Registers the handler for received data packets, replacing any
    /// previous one.
    ///
    /// The handler runs in interrupt context and should return quickly.
    pub fn on_receive(&self, handler: ReceiveHandler) {
        self.with(|inner| inner.handler = Some(handler));
    }

    /// Removes the receive handler.
    pub fn clear_receive_handler(&self) {
        self.with(|inner| inner.handler = None);
    }

    /// Takes the oldest packet from the receive queue.
    pub fn receive(&self) -> Option<Packet> {
        self.with(|inner| inner.queue.pop_front())
    }

    /// Whether the receive queue holds a packet
    pub fn available(&self) -> bool {
        self.with(|inner| !inner.queue.is_empty())
    }

    /// Snapshot of the reception counters
    pub fn stats(&self) -> RxStats {
        self.with(|inner| inner.stats)
    }
}

impl<SPI> Radio<SPI>
where
    SPI: SpiDevice,
{
    /// Pulses the reset line low for 10 ms, then waits another 10 ms.
    ///
    /// Forgets the cached mode; [`Radio::init`] has to run afterwards.
    pub fn reset<RST, D>(&self, reset: &mut RST, delay: &mut D) -> Result<(), Error>
    where
        RST: OutputPin,
        D: DelayNs,
    {
        reset.set_low().map_err(|_| Error::Reset)?;
        delay.delay_ms(RESET_PULSE_MS);
        reset.set_high().map_err(|_| Error::Reset)?;
        delay.delay_ms(RESET_PULSE_MS);

        self.with(|inner| inner.modes = ModeController::new());
        Ok(())
    }

    /// Brings the chip up in LoRa mode and starts listening.
    ///
    /// Must run before the DIO0 interrupt is enabled. The critical section is
    /// held for the whole sequence, including the settling delays.
    ///
    /// # Errors
    /// * [`Error::ModeMismatch`] - the mode register did not accept sleep or
    ///   standby; the radio must not be used
    /// * [`Error::Bus`] - SPI communication failed
    pub fn init<D: DelayNs>(&self, delay: &mut D) -> Result<(), Error> {
        self.with(|inner| -> Result<(), Error> {
            let Inner { device, modes, .. } = &mut *inner;

            modes.force(device, Mode::Sleep, delay)?;
            device.write_register(FifoTxBaseAddr {
                address: TX_BASE_ADDRESS,
            })?;
            device.write_register(FifoRxBaseAddr {
                address: RX_BASE_ADDRESS,
            })?;
            modes.force(device, Mode::Standby, delay)?;

            inner.apply_modem_preset(inner.config.modem)?;
            inner.apply_frequency(inner.config.frequency_mhz)?;
            inner.apply_tx_power(inner.config.tx_power_dbm)?;
            inner.device.write_register(PreambleLength {
                symbols: PREAMBLE_SYMBOLS,
            })?;

            inner.modes.to_receive_continuous(&mut inner.device)?;
            info!(
                "radio up: address {}, {} MHz, {} dBm",
                inner.config.address,
                inner.config.frequency_mhz,
                inner.config.tx_power_dbm
            );
            Ok(())
        })
    }

    /// Changes the carrier frequency.
    pub fn set_frequency(&self, frequency_mhz: f32) -> Result<(), Error> {
        self.with(|inner| inner.reconfigure(|inner| inner.apply_frequency(frequency_mhz)))
    }

    /// Changes the transmit power; values outside 5..=23 dBm are clamped.
    pub fn set_tx_power(&self, power_dbm: i8) -> Result<(), Error> {
        self.with(|inner| inner.reconfigure(|inner| inner.apply_tx_power(power_dbm)))
    }

    /// Switches to another modem preset.
    pub fn set_modem_preset(&self, preset: ModemPreset) -> Result<(), Error> {
        self.with(|inner| inner.reconfigure(|inner| inner.apply_modem_preset(preset)))
    }

    /// Idles the radio.
    pub fn standby(&self) -> Result<(), Error> {
        self.with(|inner| inner.modes.to_standby(&mut inner.device).map(|_| ()))
    }

    /// Starts continuous reception.
    pub fn listen(&self) -> Result<(), Error> {
        self.with(|inner| {
            inner
                .modes
                .to_receive_continuous(&mut inner.device)
                .map(|_| ())
        })
    }

    /// Puts the radio to sleep.
    pub fn sleep(&self) -> Result<(), Error> {
        self.with(|inner| inner.modes.to_sleep(&mut inner.device).map(|_| ()))
    }

    /// Transmits `payload` to `to` without waiting for anything.
    ///
    /// The frame carries the most recently allocated sequence id. Completion
    /// is handled by the interrupt, which returns the radio to standby.
    pub fn send(&self, payload: &[u8], to: u8) -> Result<(), Error> {
        self.with(|inner| {
            let header = inner.header_to(to);
            inner.transmit(header, payload)
        })
    }

    /// Transmits `payload` to `to` and waits for its acknowledgement.
    ///
    /// Makes up to `retries + 1` attempts. Each one waits at most
    /// [`TX_COMPLETE_TIMEOUT_MS`] for the transmission to finish, then listens
    /// for `timeout_ms`. Acknowledgements for other sequence ids are ignored.
    /// The radio is left listening in every case.
    ///
    /// Returns `Ok(true)` once acknowledged and `Ok(false)` if every attempt
    /// timed out.
    ///
    /// Both limits count only the 1 ms delays between polls. SPI transfers and
    /// critical sections come on top, so the wall-clock wait runs somewhat
    /// longer than the nominal timeouts.
    ///
    /// # Errors
    /// * [`Error::BroadcastAck`] - `to` is the broadcast address; nothing is sent
    /// * [`Error::PayloadTooLarge`] - more than 251 bytes; nothing is sent
    /// * [`Error::SendInProgress`] - another call is still waiting
    pub fn send_and_wait<D: DelayNs>(
        &self,
        payload: &[u8],
        to: u8,
        retries: u8,
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<bool, Error> {
        let wait = self.begin_wait(payload, to)?;
        self.deliver(wait.id, payload, to, retries, timeout_ms, delay)
    }

    fn deliver<D: DelayNs>(
        &self,
        id: u8,
        payload: &[u8],
        to: u8,
        retries: u8,
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<bool, Error> {
        for attempt in 0..=retries {
            self.start_attempt(payload, to)?;
            if !self.poll(delay, TX_COMPLETE_TIMEOUT_MS, |inner| !inner.transmitting()) {
                warn!("no TxDone for id {}", id);
            }
            self.listen()?;
            if self.poll(delay, timeout_ms, |inner| inner.take_ack(id)) {
                debug!("id {} acknowledged on attempt {}", id, attempt);
                return Ok(true);
            }
            debug!("no ack for id {} on attempt {}", id, attempt);
        }
        self.listen()?;
        Ok(false)
    }

    /// Async version of [`Radio::send_and_wait`].
    ///
    /// Same semantics, but waits with an async delay so the executor can
    /// sleep between polls. Dropping the future releases the send slot; a
    /// frame already handed to the modem is still transmitted.
    pub async fn send_and_wait_async<D: embedded_hal_async::delay::DelayNs>(
        &self,
        payload: &[u8],
        to: u8,
        retries: u8,
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<bool, Error> {
        let wait = self.begin_wait(payload, to)?;
        self.deliver_async(wait.id, payload, to, retries, timeout_ms, delay)
            .await
    }

    async fn deliver_async<D: embedded_hal_async::delay::DelayNs>(
        &self,
        id: u8,
        payload: &[u8],
        to: u8,
        retries: u8,
        timeout_ms: u32,
        delay: &mut D,
    ) -> Result<bool, Error> {
        for attempt in 0..=retries {
            self.start_attempt(payload, to)?;
            if !self
                .poll_async(delay, TX_COMPLETE_TIMEOUT_MS, |inner| !inner.transmitting())
                .await
            {
                warn!("no TxDone for id {}", id);
            }
            self.listen()?;
            if self.poll_async(delay, timeout_ms, |inner| inner.take_ack(id)).await {
                debug!("id {} acknowledged on attempt {}", id, attempt);
                return Ok(true);
            }
            debug!("no ack for id {} on attempt {}", id, attempt);
        }
        self.listen()?;
        Ok(false)
    }

    /// Handles a DIO0 edge. Call from the interrupt handler.
    ///
    /// Clears the chip's interrupt flags first, then either drains a received
    /// frame or finishes a transmission, depending on the cached mode. Other
    /// interrupt causes are ignored.
    pub fn on_interrupt(&self) -> Result<(), Error> {
        let delivered = self.with(|inner| -> Result<_, Error> {
            Ok(inner.dispatch()?.zip(inner.handler))
        })?;

        if let Some((packet, handler)) = delivered {
            handler(&packet);
        }
        Ok(())
    }

    fn begin_wait(&self, payload: &[u8], to: u8) -> Result<WaitGuard<'_, SPI>, Error> {
        if to == BROADCAST_ADDRESS {
            return Err(Error::BroadcastAck);
        }
        if payload.len() > MAX_PAYLOAD_LEN {
            return Err(Error::PayloadTooLarge(payload.len()));
        }
        self.with(|inner| {
            if inner.ack.active {
                return Err(Error::SendInProgress);
            }
            inner.ack.active = true;
            inner.sequence = inner.sequence.wrapping_add(1);
            Ok(WaitGuard {
                radio: self,
                id: inner.sequence,
            })
        })
    }

    fn start_attempt(&self, payload: &[u8], to: u8) -> Result<(), Error> {
        self.with(|inner| {
            inner.ack.received = false;
            let header = inner.header_to(to);
            inner.transmit(header, payload)
        })
    }

    fn poll<D: DelayNs>(
        &self,
        delay: &mut D,
        timeout_ms: u32,
        mut done: impl FnMut(&mut Inner<SPI>) -> bool,
    ) -> bool {
        let mut elapsed = 0;
        loop {
            if self.with(&mut done) {
                return true;
            }
            if elapsed >= timeout_ms {
                return false;
            }
            delay.delay_ms(POLL_INTERVAL_MS);
            elapsed += POLL_INTERVAL_MS;
        }
    }

    async fn poll_async<D: embedded_hal_async::delay::DelayNs>(
        &self,
        delay: &mut D,
        timeout_ms: u32,
        mut done: impl FnMut(&mut Inner<SPI>) -> bool,
    ) -> bool {
        let mut elapsed = 0;
        loop {
            if self.with(&mut done) {
                return true;
            }
            if elapsed >= timeout_ms {
                return false;
            }
            delay.delay_ms(POLL_INTERVAL_MS).await;
            elapsed += POLL_INTERVAL_MS;
        }
    }
}

impl<SPI> Inner<SPI>
where
    SPI: SpiDevice,
{
    fn header_to(&self, to: u8) -> Header {
        Header {
            to,
            from: self.config.address,
            id: self.sequence,
            flags: Flags::empty(),
        }
    }

    fn transmitting(&self) -> bool {
        self.modes.current() == Some(Mode::Transmit)
    }

    /// Consumes a pending acknowledgement; true if it matches `id`.
    fn take_ack(&mut self, id: u8) -> bool {
        if !self.ack.received {
            return false;
        }
        match &self.ack.last_ack {
            Some(ack) if ack.header.id == id => true,
            _ => {
                trace!("ignoring stale ack");
                self.ack.received = false;
                false
            }
        }
    }

    /// Loads a frame into the FIFO and starts transmitting it.
    fn transmit(&mut self, header: Header, payload: &[u8]) -> Result<(), Error> {
        let mut frame = [0u8; MAX_FRAME_LEN];
        let len = packet::encode(header, payload, &mut frame)
            .map_err(|_| Error::PayloadTooLarge(payload.len()))?;

        self.modes.to_standby(&mut self.device)?;
        self.device.write_register(FifoAddrPtr {
            address: TX_BASE_ADDRESS,
        })?;
        self.device.write_fifo(&frame[..len])?;
        self.device.write_register(PayloadLength { length: len as u8 })?;
        self.modes.to_transmit(&mut self.device)?;
        trace!("tx {} bytes to {} id {}", len, header.to, header.id);
        Ok(())
    }

    /// Runs `apply` in standby, then returns to the previous mode unless a
    /// transmission was cut short.
    fn reconfigure(
        &mut self,
        apply: impl FnOnce(&mut Self) -> Result<(), Error>,
    ) -> Result<(), Error> {
        let resume = self.modes.current();
        self.modes.to_standby(&mut self.device)?;
        apply(self)?;
        match resume {
            Some(Mode::ReceiveContinuous) => self.modes.to_receive_continuous(&mut self.device)?,
            Some(Mode::Sleep) => self.modes.to_sleep(&mut self.device)?,
            _ => false,
        };
        Ok(())
    }

    fn apply_frequency(&mut self, frequency_mhz: f32) -> Result<(), Error> {
        self.device
            .write_register(config::frequency_to_register(frequency_mhz))?;
        self.config.frequency_mhz = frequency_mhz;
        Ok(())
    }

    fn apply_tx_power(&mut self, power_dbm: i8) -> Result<(), Error> {
        let regs = config::tx_power_registers(power_dbm);
        self.device.write_register(regs.pa_dac)?;
        self.device.write_register(regs.pa_config)?;
        self.config.tx_power_dbm =
            power_dbm.clamp(config::MIN_TX_POWER_DBM, config::MAX_TX_POWER_DBM);
        Ok(())
    }

    fn apply_modem_preset(&mut self, preset: ModemPreset) -> Result<(), Error> {
        let [config1, config2, config3] = preset.register_values();
        self.device.write(ModemConfig1::id(), &[config1])?;
        self.device.write(ModemConfig2::id(), &[config2])?;
        self.device.write(ModemConfig3::id(), &[config3])?;
        self.config.modem = preset;
        Ok(())
    }

    /// Interrupt body. Returns the packet to hand to the receive handler.
    fn dispatch(&mut self) -> Result<Option<Packet>, Error> {
        let irq: IrqFlags = self.device.read_register()?;
        self.device.write_register(irq)?;

        match self.modes.current() {
            Some(Mode::ReceiveContinuous) if irq.flags.contains(Interrupts::RX_DONE) => {
                self.receive_frame()
            }
            Some(Mode::Transmit) if irq.flags.contains(Interrupts::TX_DONE) => {
                self.modes.to_standby(&mut self.device)?;
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    fn receive_frame(&mut self) -> Result<Option<Packet>, Error> {
        let len = self.device.read_register::<RxNbBytes>()?.count as usize;
        let start = self.device.read_register::<FifoRxCurrentAddr>()?.address;
        self.device.write_register(FifoAddrPtr { address: start })?;

        let mut frame = [0u8; MAX_FRAME_LEN];
        self.device.read_fifo(&mut frame[..len])?;
        if len < HEADER_LEN {
            debug!("dropping {} byte frame", len);
            return Ok(None);
        }

        let snr = self.device.read_register::<PktSnrValue>()?.raw;
        let rssi = self.device.read_register::<PktRssiValue>()?.raw;
        let quality = SignalQuality::from_raw(snr, rssi, self.config.is_high_band());

        let packet = match Packet::from_frame(&frame[..len], quality) {
            Ok(packet) => packet,
            Err(_) => return Ok(None),
        };

        let me = self.config.address;
        let header = packet.header;
        if header.to != me && !header.is_broadcast() && !self.config.receive_all {
            trace!("frame for {} ignored", header.to);
            return Ok(None);
        }

        if header.to == me && header.is_ack() {
            trace!("ack from {} id {}", header.from, header.id);
            self.ack.last_ack = Some(packet);
            self.ack.received = true;
            return Ok(None);
        }

        self.stats.packets = self.stats.packets.wrapping_add(1);
        self.stats.last_rssi = packet.rssi;
        if self.queue.push_back(packet.clone()).is_err() {
            self.stats.overruns = self.stats.overruns.wrapping_add(1);
            warn!("receive queue full, packet from {} dropped", header.from);
        }

        // a failed ack does not undo acceptance
        if self.config.auto_ack && header.to == me {
            if let Err(err) = self.transmit(Header::ack_for(&header, me), &[]) {
                warn!("ack to {} failed: {:?}", header.from, err);
            }
        }
        Ok(Some(packet))
    }
}
