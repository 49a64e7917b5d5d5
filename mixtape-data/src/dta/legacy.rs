//! Releases 113-115: fixed binary header, no section tags

use std::collections::{BTreeMap, HashMap};

use super::cursor::{ByteOrder, Cursor};
use super::{assemble, read_data, read_text, read_value_label_table, DtaError, VarType, Variable};
use crate::table::Table;

const NAME_LEN: usize = 33;
const DATA_LABEL_LEN: usize = 81;
const TIMESTAMP_LEN: usize = 18;
const VAR_LABEL_LEN: usize = 81;

fn var_type(code: u8, index: usize) -> Result<VarType, DtaError> {
    Ok(match code {
        251 => VarType::Byte,
        252 => VarType::Int,
        253 => VarType::Long,
        254 => VarType::Float,
        255 => VarType::Double,
        1..=244 => VarType::Str(code.into()),
        _ => {
            return Err(DtaError::UnknownType {
                code: code.into(),
                index,
            })
        }
    })
}

pub(crate) fn read(bytes: &[u8], release: u8) -> Result<Table, DtaError> {
    let mut c = Cursor::new(bytes);
    c.skip(1)?;
    let order = match c.u8()? {
        1 => ByteOrder::Big,
        2 => ByteOrder::Little,
        other => return Err(DtaError::ByteOrder(other.to_string())),
    };
    c.set_order(order);
    // filetype, unused
    c.skip(2)?;

    let nvar = c.u16()? as usize;
    let nobs = c.u32()? as usize;
    let data_label = read_text(&mut c, DATA_LABEL_LEN, false)?;
    c.skip(TIMESTAMP_LEN)?;

    let types = c
        .take(nvar)?
        .iter()
        .enumerate()
        .map(|(i, &code)| var_type(code, i))
        .collect::<Result<Vec<_>, _>>()?;
    let names = read_fields(&mut c, nvar, NAME_LEN)?;
    // sort order
    c.skip((nvar + 1) * 2)?;
    let fmt_len = if release == 113 { 12 } else { 49 };
    let formats = read_fields(&mut c, nvar, fmt_len)?;
    let label_names = read_fields(&mut c, nvar, NAME_LEN)?;
    let var_labels = read_fields(&mut c, nvar, VAR_LABEL_LEN)?;

    // expansion fields: (type: u8, len: u32, contents) until type 0
    loop {
        let kind = c.u8()?;
        let len = c.u32()? as usize;
        if kind == 0 {
            break;
        }
        c.skip(len)?;
    }

    let vars: Vec<Variable> = types
        .into_iter()
        .zip(names)
        .zip(formats)
        .zip(label_names.into_iter().zip(var_labels))
        .map(|(((vtype, name), format), (value_labels, label))| Variable {
            name,
            vtype,
            format,
            value_labels,
            label,
        })
        .collect();

    let builders = read_data(&mut c, &vars, nobs, false, None)?;

    // value labels run to the end of the file
    let mut value_labels = BTreeMap::new();
    while c.remaining() > 0 {
        let len = c.u32()? as usize;
        let name = read_text(&mut c, NAME_LEN, false)?;
        c.skip(3)?;
        let labels = read_value_label_table(&mut c, len, false)?;
        value_labels.insert(name, labels);
    }

    assemble(nobs, data_label, vars, builders, &HashMap::new(), value_labels)
}

fn read_fields(c: &mut Cursor<'_>, count: usize, width: usize) -> Result<Vec<String>, DtaError> {
    (0..count).map(|_| read_text(c, width, false)).collect()
}

#[cfg(test)]
mod tests {
    use super::super::from_bytes;
    use crate::table::{ColumnData, Value};
    use chrono::NaiveDate;

    fn fixed(text: &str, width: usize) -> Vec<u8> {
        let mut out = text.as_bytes().to_vec();
        out.resize(width, 0);
        out
    }

    /// Hand-built release 114 file: byte `grp` (labeled), double `y`,
    /// str3 `st`, long `day` formatted %td. Two rows, second row missing.
    fn release_114(big_endian: bool) -> Vec<u8> {
        let u16b = |v: u16| if big_endian { v.to_be_bytes().to_vec() } else { v.to_le_bytes().to_vec() };
        let u32b = |v: u32| if big_endian { v.to_be_bytes().to_vec() } else { v.to_le_bytes().to_vec() };
        let f64b = |v: f64| if big_endian { v.to_be_bytes().to_vec() } else { v.to_le_bytes().to_vec() };

        let mut b = vec![114, if big_endian { 1 } else { 2 }, 1, 0];
        b.extend(u16b(4));
        b.extend(u32b(2));
        b.extend(fixed("Legacy sample", 81));
        b.extend(fixed("01 Jan 2010 10:00", 18));
        b.extend([251, 255, 3, 253]);
        for name in ["grp", "y", "st", "day"] {
            b.extend(fixed(name, 33));
        }
        b.extend(vec![0u8; 10]);
        for fmt in ["%8.0g", "%10.0g", "%9s", "%td"] {
            b.extend(fixed(fmt, 49));
        }
        for lbl in ["grp_lbl", "", "", ""] {
            b.extend(fixed(lbl, 33));
        }
        for lbl in ["Group", "Outcome", "State", "Day"] {
            b.extend(fixed(lbl, 81));
        }
        // one expansion field, then terminator
        b.push(1);
        b.extend(u32b(3));
        b.extend(b"abc");
        b.push(0);
        b.extend(u32b(0));

        // row 1
        b.push(1);
        b.extend(f64b(2.5));
        b.extend(fixed("TX", 3));
        b.extend(u32b(365));
        // row 2: missing byte, .a double, full-width string, missing long
        b.push(101);
        b.extend(f64b(f64::from_bits(0x7fe0_0000_0000_0001)));
        b.extend(b"FLA");
        b.extend(u32b(2_147_483_621));

        // value labels: grp_lbl {1: "treated"}
        let txt = b"treated\0";
        let mut table = Vec::new();
        table.extend(u32b(1));
        table.extend(u32b(txt.len() as u32));
        table.extend(u32b(0));
        table.extend(u32b(1));
        table.extend(txt);
        b.extend(u32b(table.len() as u32));
        b.extend(fixed("grp_lbl", 33));
        b.extend([0, 0, 0]);
        b.extend(table);
        b
    }

    fn check(bytes: &[u8]) {
        let table = from_bytes(bytes).unwrap();
        assert_eq!(table.shape(), (2, 4));
        assert_eq!(table.label(), "Legacy sample");
        assert_eq!(table.column_names(), vec!["grp", "y", "st", "day"]);

        let grp = table.column("grp").unwrap();
        assert_eq!(grp.label, "Group");
        assert_eq!(grp.data, ColumnData::Int8(vec![Some(1), None]));
        assert_eq!(table.get(0, "y"), Some(Value::Float(2.5)));
        assert_eq!(table.get(1, "y"), Some(Value::Missing));
        assert_eq!(table.get(1, "st"), Some(Value::Str("FLA")));
        assert_eq!(
            table.column("day").unwrap().data,
            ColumnData::Date(vec![NaiveDate::from_ymd_opt(1960, 12, 31), None])
        );
        assert_eq!(
            table.labeled("grp").unwrap(),
            vec![Some("treated".to_string()), None]
        );
    }

    #[test]
    fn test_reads_little_endian() {
        check(&release_114(false));
    }

    #[test]
    fn test_reads_big_endian() {
        check(&release_114(true));
    }

    #[test]
    fn test_truncated_data_section() {
        let mut bytes = release_114(false);
        // drop value labels and half of the second row
        let data_end = bytes.len() - (4 + 33 + 3 + 4 + 4 + 4 + 4 + 8) - 8;
        bytes.truncate(data_end);
        let err = from_bytes(&bytes).unwrap_err();
        assert!(matches!(err, super::DtaError::Truncated { .. }));
    }
}
