//! Black-box scenarios driven purely through MMIO reads/writes, mirroring
//! the concrete scenarios and invariants enumerated for this register file.

use devices::tpm::bus::BusDevice;
use devices::tpm::{TisConfig, TpmTis};
use vtpm::stub::StubBackend;
use vtpm::TpmVersion;

fn locality_base(locality: u8) -> u64 {
    (locality as u64) << 12
}

fn read_u32(dev: &mut TpmTis, base: u64, offset: u64) -> u32 {
    let mut buf = [0u8; 4];
    dev.read(base, offset, &mut buf);
    u32::from_le_bytes(buf)
}

fn read_u8(dev: &mut TpmTis, base: u64, offset: u64) -> u8 {
    let mut buf = [0u8; 1];
    dev.read(base, offset, &mut buf);
    buf[0]
}

fn write_bytes(dev: &mut TpmTis, base: u64, offset: u64, bytes: &[u8]) {
    dev.write(base, offset, bytes);
}

const ACCESS: u64 = 0x00;
const INT_ENABLE: u64 = 0x08;
const INT_VECTOR: u64 = 0x0c;
const INT_STATUS: u64 = 0x10;
const STS: u64 = 0x18;
const DATA_FIFO: u64 = 0x24;
const INTERFACE_ID: u64 = 0x30;
const DID_VID: u64 = 0xf00;
const RID: u64 = 0xf04;

fn new_device(version: TpmVersion) -> TpmTis {
    let backend = StubBackend::new(version, 4096);
    TpmTis::new(TisConfig::new(5).unwrap(), Box::new(backend))
}

#[test]
fn request_and_active() {
    let mut dev = new_device(TpmVersion::V2_0);
    let base = locality_base(0);

    write_bytes(&mut dev, base, ACCESS, &[0x02]);
    let access = read_u8(&mut dev, base, ACCESS);

    assert_eq!(access, 0xA1);
}

#[test]
fn command_round_trip() {
    let mut backend = StubBackend::new(TpmVersion::V2_0, 4096);
    let mut response = vec![0u8; 12];
    response[2] = 0x00;
    response[3] = 0x0C;
    backend.push_response(response);

    let mut dev = TpmTis::new(TisConfig::new(5).unwrap(), Box::new(backend));
    let base = locality_base(0);

    write_bytes(&mut dev, base, ACCESS, &[0x02]);
    write_bytes(&mut dev, base, STS, &[0x40]); // COMMAND_READY

    let command = [0x00u8, 0x01, 0x00, 0x0A, 0, 0, 0, 0, 0, 0];
    for byte in command.iter() {
        write_bytes(&mut dev, base, DATA_FIFO, &[*byte]);
    }

    let sts = read_u32(&mut dev, base, STS);
    assert_eq!(sts & 0x08, 0, "EXPECT should be clear after 10 bytes");
    assert_ne!(sts & 0x80, 0, "VALID should be set");

    write_bytes(&mut dev, base, STS, &[0x20]); // TPM_GO

    let sts = read_u32(&mut dev, base, STS);
    assert_eq!(sts & 0xff, 0x80 | 0x10, "VALID | DATA_AVAILABLE");
    assert_eq!((sts >> 8) & 0xffff, 12, "burst count is the 12-byte response size");

    for _ in 0..12 {
        read_u8(&mut dev, base, DATA_FIFO);
    }

    let sts = read_u32(&mut dev, base, STS);
    assert_eq!(sts & 0x10, 0, "DATA_AVAILABLE clears after the last byte");
}

#[test]
fn seize_denied_when_not_strictly_higher() {
    let mut dev = new_device(TpmVersion::V2_0);
    write_bytes(&mut dev, locality_base(2), ACCESS, &[0x02]); // locality 2 becomes active

    write_bytes(&mut dev, locality_base(1), ACCESS, &[0x08]); // SEIZE, lower locality

    let access2 = read_u8(&mut dev, locality_base(2), ACCESS);
    assert_ne!(access2 & 0x20, 0, "locality 2 stays active");
}

#[test]
fn withdrawing_a_request_clears_request_use() {
    let mut dev = new_device(TpmVersion::V2_0);
    write_bytes(&mut dev, locality_base(0), ACCESS, &[0x02]); // locality 0 active
    write_bytes(&mut dev, locality_base(1), ACCESS, &[0x02]); // locality 1 requests use

    let access0_before = read_u8(&mut dev, locality_base(0), ACCESS);
    assert_ne!(access0_before & 0x04, 0, "locality 0 sees a pending request");

    // Locality 1 withdraws its own request before it's ever granted.
    write_bytes(&mut dev, locality_base(1), ACCESS, &[0x20]);

    let access0_after = read_u8(&mut dev, locality_base(0), ACCESS);
    assert_eq!(access0_after & 0x04, 0, "withdrawn request no longer pends");

    // Releasing locality 0 must not hand off to the withdrawn request.
    write_bytes(&mut dev, locality_base(0), ACCESS, &[0x20]);
    let access1 = read_u8(&mut dev, locality_base(1), ACCESS);
    assert_eq!(access1 & 0x20, 0, "locality 1 never became active");
}

#[test]
fn seize_with_no_active_locality_does_not_raise_spurious_command_ready() {
    let mut dev = new_device(TpmVersion::V2_0);
    write_bytes(&mut dev, locality_base(2), ACCESS, &[0x08]); // SEIZE, nothing active yet

    let access2 = read_u8(&mut dev, locality_base(2), ACCESS);
    assert_ne!(access2 & 0x20, 0, "locality 2 becomes active");

    let sts2 = read_u32(&mut dev, locality_base(2), STS);
    assert_eq!(sts2 & 0x40, 0, "no abort was in flight, so COMMAND_READY must not be set");
}

#[test]
fn locality_four_is_reserved_and_ignored() {
    let mut dev = new_device(TpmVersion::V2_0);
    write_bytes(&mut dev, locality_base(4), ACCESS, &[0x02]);

    let access0 = read_u8(&mut dev, locality_base(0), ACCESS);
    assert_eq!(access0 & 0x20, 0, "locality 0 never became active");
}

#[test]
fn establishment_reset_forwarded_only_for_locality_three_and_four() {
    let mut dev = new_device(TpmVersion::V2_0);
    let base3 = locality_base(3);
    write_bytes(&mut dev, base3, ACCESS, &[0x02]);
    // RESET_ESTABLISHMENT_BIT (1 << 25); forwarded to the backend, not
    // independently observable over MMIO, so this just exercises the path
    // without panicking.
    write_bytes(&mut dev, base3, STS, &(1u32 << 25).to_le_bytes());
}

#[test]
fn int_vector_read_returns_configured_irq() {
    let mut dev = new_device(TpmVersion::V2_0);
    let val = read_u32(&mut dev, locality_base(0), INT_VECTOR);
    assert_eq!(val, 5);
}

#[test]
fn did_vid_and_rid_are_fixed() {
    let mut dev = new_device(TpmVersion::V2_0);
    assert_eq!(read_u32(&mut dev, locality_base(0), DID_VID), 0x0001_1014);
    assert_eq!(read_u32(&mut dev, locality_base(0), RID), 0x01);
}

#[test]
fn interface_id_lock_is_sticky_across_all_localities() {
    let mut dev = new_device(TpmVersion::V2_0);
    write_bytes(&mut dev, locality_base(0), INTERFACE_ID, &(1u32 << 19).to_le_bytes());

    for locality in 0..5u8 {
        let val = read_u32(&mut dev, locality_base(locality), INTERFACE_ID);
        assert_ne!(val & (1 << 19), 0, "locked in locality {}", locality);
    }
}

#[test]
fn int_status_write_one_to_clear() {
    let mut dev = new_device(TpmVersion::V2_0);
    let base = locality_base(0);
    write_bytes(&mut dev, base, ACCESS, &[0x02]);
    write_bytes(&mut dev, base, INT_ENABLE, &0xffff_ffffu32.to_le_bytes());
    write_bytes(&mut dev, base, STS, &[0x40]); // raises COMMAND_READY irq

    let pending = read_u32(&mut dev, base, INT_STATUS);
    assert_ne!(pending, 0);

    write_bytes(&mut dev, base, INT_STATUS, &pending.to_le_bytes());
    assert_eq!(read_u32(&mut dev, base, INT_STATUS), 0);
}

#[test]
fn startup_error_makes_all_mmio_a_no_op() {
    let backend = StubBackend::new(TpmVersion::V2_0, 4096).with_startup_error();
    let mut dev = TpmTis::new(TisConfig::new(5).unwrap(), Box::new(backend));
    let base = locality_base(0);

    write_bytes(&mut dev, base, ACCESS, &[0x02]); // ignored
    assert_eq!(read_u32(&mut dev, base, ACCESS), 0);
    assert_eq!(read_u32(&mut dev, base, DID_VID), 0, "reads return 0, not the fixed DID_VID");
}

#[test]
fn command_ready_from_ready_is_idempotent() {
    let mut dev = new_device(TpmVersion::V2_0);
    let base = locality_base(0);
    write_bytes(&mut dev, base, ACCESS, &[0x02]);
    write_bytes(&mut dev, base, STS, &[0x40]);
    write_bytes(&mut dev, base, DATA_FIFO, &[0xAB]);

    // Reception -> abort -> Ready, then Ready -> Ready resets rw_offset
    // again; neither write should panic or leave COMMAND_READY unset.
    write_bytes(&mut dev, base, STS, &[0x40]);
    write_bytes(&mut dev, base, STS, &[0x40]);

    let sts = read_u32(&mut dev, base, STS);
    assert_ne!(sts & 0x40, 0, "COMMAND_READY remains set");
}
