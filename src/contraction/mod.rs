//! Pure contraction primitives: nucleon two/three-point forms, spin projectors
//! and the dense trace/GEMM helpers underneath them.

pub mod linalg;
pub mod nucleon;
pub mod projector;

pub use linalg::{acc_tr_mul, acc_tr_mul_flops, mul, mul_flops, LinalgScalar};
pub use nucleon::{
    contract_2pt, contract_2pt_flops, contract_3pt_flops, contract_3pt_tplus_pxy, contract_3pt_up,
    contract_tplus,
};
pub use projector::{
    proj_tplus, proj_tplus_pxy, tplus_projector, tplus_pxy_projector, tr_proj_tplus, tr_proj_tplus_pxy,
};
