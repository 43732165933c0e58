use super::{HarnessConfig, ProviderKind};
use std::time::Duration;

/// Transport module that relays bytes unchanged
///
/// It imports a WASI function it never calls, like real transport modules do,
/// to exercise import stubbing during instantiation.
pub const IDENTITY_MODULE_WAT: &str = r#"
(module
  (import "wasi_snapshot_preview1" "fd_write"
    (func $fd_write (param i32 i32 i32 i32) (result i32)))
  (memory (export "memory") 1)
  (global (export "_water_v0") i32 (i32.const 0)))
"#;

/// Transport module that XORs every byte on the wire with `0x5a`
pub const XOR_MODULE_WAT: &str = r#"
(module
  (memory (export "memory") 1)
  (global (export "_water_v0") i32 (i32.const 0))
  (func (export "water_alloc") (param $len i32) (result i32)
    (if (i32.gt_u (local.get $len) (i32.const 64512))
      (then unreachable))
    (i32.const 1024))
  (func $xor (param $ptr i32) (param $len i32) (result i32)
    (local $i i32)
    (block $done
      (loop $next
        (br_if $done (i32.ge_u (local.get $i) (local.get $len)))
        (i32.store8
          (i32.add (local.get $ptr) (local.get $i))
          (i32.xor
            (i32.load8_u (i32.add (local.get $ptr) (local.get $i)))
            (i32.const 0x5a)))
        (local.set $i (i32.add (local.get $i) (i32.const 1)))
        (br $next)))
    (local.get $len))
  (func (export "water_wrap") (param i32 i32) (result i32)
    (call $xor (local.get 0) (local.get 1)))
  (func (export "water_unwrap") (param i32 i32) (result i32)
    (call $xor (local.get 0) (local.get 1))))
"#;

/// Harness configuration with no pause between rounds, for tests
pub fn fast_config(provider: ProviderKind) -> HarnessConfig {
    HarnessConfig {
        provider,
        round_delay: Duration::ZERO,
        redial_timeout: Duration::from_secs(2),
        io_timeout: Duration::from_secs(2),
        ..HarnessConfig::default()
    }
}
