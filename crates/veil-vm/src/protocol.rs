//! Well-known names on the MPC collaborator surface
//!
//! Arithmetic and bitwise instructions whose operands are both `Share`
//! values delegate to foreign functions under these names. The protocol
//! layer registers implementations through the ordinary foreign-function
//! surface; the VM itself never interprets share bytes, and the only way
//! from the secret domain back to the clear domain is an explicit call to
//! [`REVEAL`].

/// `ADD` on two shares: `mpc_add(a, b) -> share`
pub const ADD: &str = "mpc_add";
/// `SUB` on two shares
pub const SUB: &str = "mpc_sub";
/// `MUL` on two shares
pub const MUL: &str = "mpc_mul";
/// `DIV` on two shares
pub const DIV: &str = "mpc_div";
/// `MOD` on two shares
pub const MOD: &str = "mpc_mod";
/// `AND` on two shares
pub const AND: &str = "mpc_and";
/// `OR` on two shares
pub const OR: &str = "mpc_or";
/// `XOR` on two shares
pub const XOR: &str = "mpc_xor";
/// `NOT` on a share
pub const NOT: &str = "mpc_not";
/// `SHL` on a share with a clear shift amount
pub const SHL: &str = "mpc_shl";
/// `SHR` on a share with a clear shift amount
pub const SHR: &str = "mpc_shr";
/// Explicit reveal: `mpc_reveal(share) -> clear value`
pub const REVEAL: &str = "mpc_reveal";
