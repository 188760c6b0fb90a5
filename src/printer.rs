//! Bluetooth thermal printer client.
//!
//! The printer is reached through a [`PrinterLink`]: a byte sink that can be
//! paired, written to in small chunks, and dropped. There is no read-back
//! channel, so a successful write only means the bytes left this machine.
//!
//! Two links exist: [`GattLink`] finds a Bluetooth LE printer by its
//! 0x18F0 service and writes to its writable characteristic, and
//! [`SerialLink`] writes to an already bound SPP serial port.
//!
//! [`PrinterClient`] owns at most one link and runs every blocking link call
//! on tokio's blocking pool. While a connect or print is in flight any other
//! request is refused with [`PrintError::Busy`].

use std::io::Write;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use btleplug::api::{Central, CharPropFlags, Characteristic, Manager as _, Peripheral as _, ScanFilter, WriteType};
use btleplug::platform::{Manager, Peripheral};
use tokio::runtime::Handle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::PrintError;

/// GATT service advertised by common Bluetooth thermal printers.
pub const THERMAL_PRINTER_SERVICE_UUID: &str = "000018f0-0000-1000-8000-00805f9b34fb";
/// 16-bit short form of [`THERMAL_PRINTER_SERVICE_UUID`].
pub const THERMAL_PRINTER_SERVICE_SHORT: u16 = 0x18F0;
/// [`THERMAL_PRINTER_SERVICE_UUID`] as a value.
pub const THERMAL_PRINTER_SERVICE: Uuid = Uuid::from_u128(0x0000_18f0_0000_1000_8000_0080_5f9b_34fb);
/// Largest write accepted by the printer's characteristic.
pub const CHUNK_SIZE: usize = 20;

const SERIAL_TIMEOUT_MS: u64 = 3000;
/// How long to listen for advertisements before picking a printer.
const SCAN_WINDOW: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Link trait
// ---------------------------------------------------------------------------

/// Byte-level channel to one printer.
pub trait PrinterLink: Send {
    /// Find the device and its writable channel.
    fn pair(&mut self) -> Result<(), String>;

    /// Write one chunk. Chunks arrive in call order.
    fn write(&mut self, chunk: &[u8]) -> Result<(), String>;

    fn disconnect(&mut self);

    /// Human-readable description of the connection target.
    fn description(&self) -> String;
}

// ---------------------------------------------------------------------------
// Serial (SPP / RFCOMM) link
// ---------------------------------------------------------------------------

/// Bluetooth printer bound to a serial port (`/dev/rfcomm0`, `COM5`, ...).
pub struct SerialLink {
    port_name: String,
    baud_rate: u32,
    port: Option<Box<dyn serialport::SerialPort>>,
}

impl SerialLink {
    pub fn new(port_name: &str, baud_rate: u32) -> Self {
        Self {
            port_name: port_name.to_string(),
            baud_rate,
            port: None,
        }
    }

}

impl PrinterLink for SerialLink {
    fn pair(&mut self) -> Result<(), String> {
        info!(port = %self.port_name, baud = self.baud_rate, "Opening printer port");
        let port = serialport::new(&self.port_name, self.baud_rate)
            .timeout(Duration::from_millis(SERIAL_TIMEOUT_MS))
            .open()
            .map_err(|e| format!("Failed to open {}: {e}", self.port_name))?;
        self.port = Some(port);
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), String> {
        let port = self.port.as_mut().ok_or("Serial port not open")?;
        debug!("Printer TX ({} bytes): {:02X?}", chunk.len(), chunk);
        port.write_all(chunk)
            .map_err(|e| format!("Serial write error: {e}"))?;
        port.flush().map_err(|e| format!("Serial flush error: {e}"))
    }

    fn disconnect(&mut self) {
        if self.port.take().is_some() {
            info!(port = %self.port_name, "Printer port closed");
        }
    }

    fn description(&self) -> String {
        format!("Serial({}@{})", self.port_name, self.baud_rate)
    }
}

/// Serial ports that look like Bluetooth printers.
pub fn discover_bluetooth_ports() -> Result<Vec<String>, PrintError> {
    let ports = serialport::available_ports()
        .map_err(|e| PrintError::Pairing(format!("Failed to list ports: {e}")))?;
    let found: Vec<String> = ports
        .into_iter()
        .filter(|p| {
            matches!(p.port_type, serialport::SerialPortType::BluetoothPort)
                || p.port_name.contains("rfcomm")
        })
        .map(|p| p.port_name)
        .collect();
    debug!(count = found.len(), "Bluetooth serial ports discovered");
    Ok(found)
}

// ---------------------------------------------------------------------------
// GATT (Bluetooth LE) link
// ---------------------------------------------------------------------------

/// First characteristic of the printer service that accepts writes.
pub fn select_write_characteristic<'a>(
    characteristics: impl IntoIterator<Item = &'a Characteristic>,
) -> Option<&'a Characteristic> {
    characteristics
        .into_iter()
        .find(|c| c.service_uuid == THERMAL_PRINTER_SERVICE && c.properties.contains(CharPropFlags::WRITE))
}

struct PairedPrinter {
    peripheral: Peripheral,
    characteristic: Characteristic,
    name: String,
}

/// Bluetooth LE printer found by scanning for [`THERMAL_PRINTER_SERVICE`].
///
/// Link calls run on a blocking thread and drive btleplug's futures through
/// the runtime `Handle` captured at construction.
pub struct GattLink {
    runtime: Handle,
    scan_window: Duration,
    paired: Option<PairedPrinter>,
}

impl GattLink {
    pub fn new(runtime: Handle) -> Self {
        Self {
            runtime,
            scan_window: SCAN_WINDOW,
            paired: None,
        }
    }

    /// Link on the current tokio runtime.
    pub fn current() -> Result<Self, PrintError> {
        let runtime = Handle::try_current().map_err(|e| PrintError::Pairing(format!("No async runtime: {e}")))?;
        Ok(Self::new(runtime))
    }

    async fn find_printer(scan_window: Duration) -> Result<PairedPrinter, String> {
        let manager = Manager::new()
            .await
            .map_err(|e| format!("Bluetooth unavailable: {e}"))?;
        let adapter = manager
            .adapters()
            .await
            .map_err(|e| format!("Failed to list Bluetooth adapters: {e}"))?
            .into_iter()
            .next()
            .ok_or("No Bluetooth adapter found")?;

        adapter
            .start_scan(ScanFilter {
                services: vec![THERMAL_PRINTER_SERVICE],
            })
            .await
            .map_err(|e| format!("Bluetooth scan failed: {e}"))?;
        tokio::time::sleep(scan_window).await;
        let peripherals = adapter.peripherals().await;
        if let Err(e) = adapter.stop_scan().await {
            debug!(error = %e, "Stopping Bluetooth scan failed");
        }
        let peripherals = peripherals.map_err(|e| format!("Failed to list Bluetooth devices: {e}"))?;

        for peripheral in peripherals {
            let properties = peripheral.properties().await.ok().flatten();
            let advertised = properties
                .as_ref()
                .is_some_and(|p| p.services.contains(&THERMAL_PRINTER_SERVICE));
            if !advertised {
                continue;
            }
            let name = properties
                .and_then(|p| p.local_name)
                .unwrap_or_else(|| peripheral.address().to_string());

            if let Err(e) = peripheral.connect().await {
                warn!(device = %name, error = %e, "Printer GATT connect failed");
                continue;
            }
            if let Err(e) = peripheral.discover_services().await {
                warn!(device = %name, error = %e, "Printer service discovery failed");
                let _ = peripheral.disconnect().await;
                continue;
            }
            let characteristics = peripheral.characteristics();
            match select_write_characteristic(&characteristics) {
                Some(characteristic) => {
                    debug!(device = %name, characteristic = %characteristic.uuid, "Writable characteristic found");
                    let characteristic = characteristic.clone();
                    return Ok(PairedPrinter {
                        peripheral,
                        characteristic,
                        name,
                    });
                }
                None => {
                    warn!(device = %name, "Printer service has no writable characteristic");
                    let _ = peripheral.disconnect().await;
                }
            }
        }
        Err(format!(
            "No printer exposing service {THERMAL_PRINTER_SERVICE_UUID} with a writable characteristic"
        ))
    }
}

impl PrinterLink for GattLink {
    fn pair(&mut self) -> Result<(), String> {
        info!(service = %THERMAL_PRINTER_SERVICE, "Scanning for Bluetooth printer");
        let paired = self.runtime.block_on(Self::find_printer(self.scan_window))?;
        info!(device = %paired.name, "Printer paired over GATT");
        self.paired = Some(paired);
        Ok(())
    }

    fn write(&mut self, chunk: &[u8]) -> Result<(), String> {
        let paired = self.paired.as_ref().ok_or("Printer not paired")?;
        debug!("Printer TX ({} bytes): {:02X?}", chunk.len(), chunk);
        self.runtime
            .block_on(
                paired
                    .peripheral
                    .write(&paired.characteristic, chunk, WriteType::WithResponse),
            )
            .map_err(|e| format!("GATT write error: {e}"))
    }

    fn disconnect(&mut self) {
        // May run on a runtime worker, where blocking on the handle would panic.
        if let Some(paired) = self.paired.take() {
            info!(device = %paired.name, "Printer GATT link closed");
            self.runtime.spawn(async move {
                if let Err(e) = paired.peripheral.disconnect().await {
                    debug!(error = %e, "GATT disconnect failed");
                }
            });
        }
    }

    fn description(&self) -> String {
        match &self.paired {
            Some(paired) => format!("BLE({})", paired.name),
            None => format!("BLE(service {THERMAL_PRINTER_SERVICE_SHORT:04X})"),
        }
    }
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrinterState {
    Disconnected,
    Connecting,
    Connected,
    Printing,
}

struct Inner {
    state: PrinterState,
    link: Option<Box<dyn PrinterLink>>,
}

/// Shared handle to the till's printer connection.
#[derive(Clone)]
pub struct PrinterClient {
    inner: Arc<Mutex<Inner>>,
}

impl Default for PrinterClient {
    fn default() -> Self {
        Self::new()
    }
}

impl PrinterClient {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner {
                state: PrinterState::Disconnected,
                link: None,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn set_state(&self, state: PrinterState) {
        self.lock().state = state;
    }

    pub fn state(&self) -> PrinterState {
        self.lock().state
    }

    pub fn is_connected(&self) -> bool {
        self.state() == PrinterState::Connected
    }

    pub fn description(&self) -> Option<String> {
        self.lock().link.as_ref().map(|l| l.description())
    }

    /// Pair `link` and keep it as the active printer. Any previous link is
    /// dropped first.
    pub async fn connect(&self, mut link: Box<dyn PrinterLink>) -> Result<(), PrintError> {
        let previous = {
            let mut inner = self.lock();
            if matches!(inner.state, PrinterState::Connecting | PrinterState::Printing) {
                return Err(PrintError::Busy);
            }
            inner.state = PrinterState::Connecting;
            inner.link.take()
        };
        let target = link.description();
        info!(target = %target, "Connecting to printer");

        let joined = tokio::task::spawn_blocking(move || {
            if let Some(mut old) = previous {
                old.disconnect();
            }
            let result = link.pair();
            (link, result)
        })
        .await;

        match joined {
            Ok((link, Ok(()))) => {
                let mut inner = self.lock();
                inner.link = Some(link);
                inner.state = PrinterState::Connected;
                info!(target = %target, "Printer connected");
                Ok(())
            }
            Ok((_, Err(reason))) => {
                self.set_state(PrinterState::Disconnected);
                warn!(target = %target, reason = %reason, "Printer pairing failed");
                Err(PrintError::Pairing(reason))
            }
            Err(e) => {
                self.set_state(PrinterState::Disconnected);
                Err(PrintError::Aborted(e.to_string()))
            }
        }
    }

    /// Stream `bytes` in [`CHUNK_SIZE`] pieces. Returns the number of chunks
    /// written. Any write failure drops the connection.
    pub async fn print(&self, bytes: Vec<u8>) -> Result<usize, PrintError> {
        let mut link = {
            let mut inner = self.lock();
            match inner.state {
                PrinterState::Connected => {}
                PrinterState::Connecting | PrinterState::Printing => return Err(PrintError::Busy),
                PrinterState::Disconnected => return Err(PrintError::NotConnected),
            }
            match inner.link.take() {
                Some(link) => {
                    inner.state = PrinterState::Printing;
                    link
                }
                None => {
                    inner.state = PrinterState::Disconnected;
                    return Err(PrintError::NotConnected);
                }
            }
        };
        let total = bytes.len().div_ceil(CHUNK_SIZE);
        debug!(bytes = bytes.len(), chunks = total, "Streaming receipt");

        let joined = tokio::task::spawn_blocking(move || {
            let mut sent = 0;
            for chunk in bytes.chunks(CHUNK_SIZE) {
                if let Err(reason) = link.write(chunk) {
                    return (link, sent, Some(reason));
                }
                sent += 1;
            }
            (link, sent, None)
        })
        .await;

        match joined {
            Ok((link, sent, None)) => {
                let mut inner = self.lock();
                inner.link = Some(link);
                inner.state = PrinterState::Connected;
                info!(chunks = sent, "Receipt sent to printer");
                Ok(sent)
            }
            Ok((mut link, sent, Some(reason))) => {
                link.disconnect();
                self.set_state(PrinterState::Disconnected);
                warn!(chunks_sent = sent, total, reason = %reason, "Printer write failed");
                Err(PrintError::Write {
                    chunks_sent: sent,
                    reason,
                })
            }
            Err(e) => {
                self.set_state(PrinterState::Disconnected);
                Err(PrintError::Aborted(e.to_string()))
            }
        }
    }

    pub fn disconnect(&self) -> Result<(), PrintError> {
        let mut inner = self.lock();
        if matches!(inner.state, PrinterState::Connecting | PrinterState::Printing) {
            return Err(PrintError::Busy);
        }
        if let Some(mut link) = inner.link.take() {
            link.disconnect();
        }
        inner.state = PrinterState::Disconnected;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Test link
// ---------------------------------------------------------------------------


#[cfg(test)]
mod tests {
    use super::testing::RecordingLink;
    use super::*;
    use std::sync::mpsc;

    #[test]
    fn test_service_uuid_matches_short_form() {
        let short = format!("{:08x}", THERMAL_PRINTER_SERVICE_SHORT);
        assert!(THERMAL_PRINTER_SERVICE_UUID.starts_with(&short));
        assert!(THERMAL_PRINTER_SERVICE_UUID.ends_with("-0000-1000-8000-00805f9b34fb"));
    }

    #[test]
    fn test_service_uuid_value_matches_string() {
        assert_eq!(THERMAL_PRINTER_SERVICE.to_string(), THERMAL_PRINTER_SERVICE_UUID);
        assert_eq!(
            THERMAL_PRINTER_SERVICE,
            btleplug::api::bleuuid::uuid_from_u16(THERMAL_PRINTER_SERVICE_SHORT)
        );
    }

    fn characteristic(uuid: u128, service: Uuid, properties: CharPropFlags) -> Characteristic {
        Characteristic {
            uuid: Uuid::from_u128(uuid),
            service_uuid: service,
            properties,
            descriptors: Default::default(),
        }
    }

    #[test]
    fn test_select_write_characteristic() {
        let battery = btleplug::api::bleuuid::uuid_from_u16(0x180F);
        let notify = characteristic(0x2AF0, THERMAL_PRINTER_SERVICE, CharPropFlags::NOTIFY);
        let other_service = characteristic(0x2A19, battery, CharPropFlags::WRITE);
        let no_response = characteristic(0x2AF2, THERMAL_PRINTER_SERVICE, CharPropFlags::WRITE_WITHOUT_RESPONSE);
        let writable = characteristic(
            0x2AF1,
            THERMAL_PRINTER_SERVICE,
            CharPropFlags::WRITE | CharPropFlags::WRITE_WITHOUT_RESPONSE,
        );
        let later = characteristic(0x2AF3, THERMAL_PRINTER_SERVICE, CharPropFlags::WRITE);

        let all = [notify.clone(), other_service.clone(), no_response.clone(), writable.clone(), later];
        assert_eq!(select_write_characteristic(&all), Some(&writable));
        assert_eq!(select_write_characteristic(&[notify, other_service, no_response]), None);
        assert_eq!(select_write_characteristic(&Vec::<Characteristic>::new()), None);
    }

    #[tokio::test]
    async fn test_gatt_link_unpaired() {
        let mut link = GattLink::current().expect("runtime");
        assert_eq!(link.description(), "BLE(service 18F0)");
        assert_eq!(link.write(&[0x1B, 0x40]), Err("Printer not paired".to_string()));
        link.disconnect();
    }

    #[test]
    fn test_gatt_link_needs_runtime() {
        assert!(matches!(GattLink::current(), Err(PrintError::Pairing(_))));
    }

    #[test]
    fn test_serial_link_description() {
        let link = SerialLink::new("/dev/rfcomm0", 9600);
        assert_eq!(link.description(), "Serial(/dev/rfcomm0@9600)");
    }

    #[tokio::test]
    async fn test_print_requires_connection() {
        let client = PrinterClient::new();
        assert_eq!(client.print(vec![1, 2, 3]).await, Err(PrintError::NotConnected));
        assert_eq!(client.state(), PrinterState::Disconnected);
    }

    #[tokio::test]
    async fn test_failed_pairing_stays_disconnected() {
        let client = PrinterClient::new();
        let link = RecordingLink {
            fail_pair: true,
            ..RecordingLink::default()
        };
        let result = client.connect(Box::new(link)).await;
        assert!(matches!(result, Err(PrintError::Pairing(_))));
        assert!(!client.is_connected());
        assert_eq!(client.description(), None);
    }

    #[tokio::test]
    async fn test_print_streams_chunks_in_order() {
        let client = PrinterClient::new();
        let link = RecordingLink::default();
        let written = link.written();
        client.connect(Box::new(link)).await.expect("connect");
        assert_eq!(client.description().as_deref(), Some("Recording"));

        let payload: Vec<u8> = (0..=52u8).collect();
        assert_eq!(client.print(payload.clone()).await, Ok(3));
        assert_eq!(client.state(), PrinterState::Connected);

        let chunks = written.lock().expect("lock").clone();
        assert_eq!(chunks.iter().map(Vec::len).collect::<Vec<_>>(), vec![20, 20, 13]);
        assert_eq!(chunks.concat(), payload);
    }

    #[tokio::test]
    async fn test_write_failure_disconnects() {
        let client = PrinterClient::new();
        let link = RecordingLink {
            fail_after: Some(2),
            ..RecordingLink::default()
        };
        client.connect(Box::new(link)).await.expect("connect");

        let result = client.print(vec![0u8; 100]).await;
        assert_eq!(
            result,
            Err(PrintError::Write {
                chunks_sent: 2,
                reason: "link lost".to_string()
            })
        );
        assert_eq!(client.state(), PrinterState::Disconnected);
        assert_eq!(client.print(vec![0u8; 4]).await, Err(PrintError::NotConnected));
    }

    #[tokio::test]
    async fn test_second_request_while_connecting_is_busy() {
        let client = PrinterClient::new();
        let (release, gate) = mpsc::channel();
        let link = RecordingLink {
            gate: Some(gate),
            ..RecordingLink::default()
        };

        let pending = {
            let client = client.clone();
            tokio::spawn(async move { client.connect(Box::new(link)).await })
        };
        while client.state() != PrinterState::Connecting {
            tokio::task::yield_now().await;
        }

        assert_eq!(
            client.connect(Box::new(RecordingLink::default())).await,
            Err(PrintError::Busy)
        );
        assert_eq!(client.print(vec![1]).await, Err(PrintError::Busy));
        assert_eq!(client.disconnect(), Err(PrintError::Busy));

        release.send(()).expect("release gate");
        pending.await.expect("join").expect("connect");
        assert!(client.is_connected());

        client.disconnect().expect("disconnect");
        assert_eq!(client.state(), PrinterState::Disconnected);
    }
}
