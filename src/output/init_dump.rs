use std::path::PathBuf;

use crate::error::Result;
use crate::io::init::{write_init, write_init_full};
use crate::state::TissueState;
use crate::topology::Tissue;

use super::{create_file, Printer};

/// Init-format rewrite, one file per checkpoint. The output parses back
/// through the init reader, so any checkpoint can seed a new run.
pub struct InitPrinter {
    dir: PathBuf,
}

impl InitPrinter {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl Printer for InitPrinter {
    fn print(
        &mut self,
        tissue: &Tissue,
        state: &TissueState,
        _time: f64,
        t_count: usize,
    ) -> Result<()> {
        let out = create_file(&self.dir, &format!("tissue_{t_count:05}.init"))?;
        write_init(tissue, state, out)
    }
}

/// Init-format rewrite carrying the full cell rows, center-triangulation
/// payload included.
pub struct TriangulatedInitPrinter {
    dir: PathBuf,
}

impl TriangulatedInitPrinter {
    #[must_use]
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }
}

impl Printer for TriangulatedInitPrinter {
    fn print(
        &mut self,
        tissue: &Tissue,
        state: &TissueState,
        _time: f64,
        t_count: usize,
    ) -> Result<()> {
        let out = create_file(&self.dir, &format!("tissue_{t_count:05}.tinit"))?;
        write_init_full(tissue, state, out)
    }
}
