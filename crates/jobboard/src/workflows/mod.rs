pub mod exemption_import;
pub mod recruitment;
