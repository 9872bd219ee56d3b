/// PCD header parser and body decoder.
pub mod pcd;
