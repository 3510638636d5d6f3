//! Integration tests for the processor module
//!
//! Tests the folder drivers end to end using small synthetic basin files.


use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};

/// One input row: hour offset from 2021-07-01 00:00, INQ, W, OTQ
pub type Row = (u32, Option<f64>, f64, f64);

/// Write a basin CSV with the standard column set
pub fn write_basin(dir: &Path, stcd: &str, rows: &[Row]) -> PathBuf {
    let mut body = String::from("STCD,TM,RZ,INQ,W,OTQ,RWCHRCD,RWPTN,INQDR,MSQMT,BLRZ\n");
    for (hour, inq, w, otq) in rows {
        let day = 1 + hour / 24;
        let inq = inq.map(|v| v.to_string()).unwrap_or_default();
        writeln!(
            body,
            "{},2021-07-{:02} {:02}:00:00,101.5,{},{:.4},{},,,,,",
            stcd,
            day,
            hour % 24,
            inq,
            w,
            otq
        )
        .unwrap();
    }
    let path = dir.join(format!("{}.csv", stcd));
    fs::write(&path, body).unwrap();
    path
}
