//! Releases 117-119: `<stata_dta>` tagged layout with strL support

use std::collections::{BTreeMap, HashMap};

use super::cursor::{ByteOrder, Cursor};
use super::{
    assemble, decode_text, read_data, read_text, read_value_label_table, DtaError, StrlLayout,
    VarType, Variable,
};
use crate::table::Table;

/// Field widths that changed between releases
struct Layout {
    release: u16,
    utf8: bool,
    name_len: usize,
    format_len: usize,
    var_label_len: usize,
    strl: StrlLayout,
}

impl Layout {
    fn for_release(release: u16) -> Result<Self, DtaError> {
        let strl = match release {
            117 => StrlLayout { v_width: 4, o_width: 4 },
            118 => StrlLayout { v_width: 2, o_width: 6 },
            119 => StrlLayout { v_width: 3, o_width: 5 },
            other => return Err(DtaError::UnsupportedRelease(other)),
        };
        let modern = release >= 118;
        Ok(Self {
            release,
            utf8: modern,
            name_len: if modern { 129 } else { 33 },
            format_len: if modern { 57 } else { 49 },
            var_label_len: if modern { 321 } else { 81 },
            strl,
        })
    }
}

fn var_type(code: u16, index: usize) -> Result<VarType, DtaError> {
    Ok(match code {
        65530 => VarType::Byte,
        65529 => VarType::Int,
        65528 => VarType::Long,
        65527 => VarType::Float,
        65526 => VarType::Double,
        32768 => VarType::StrL,
        1..=2045 => VarType::Str(code.into()),
        _ => return Err(DtaError::UnknownType { code, index }),
    })
}

pub(crate) fn read(bytes: &[u8]) -> Result<Table, DtaError> {
    let mut c = Cursor::new(bytes);
    c.expect("<stata_dta>")?;
    c.expect("<header>")?;

    c.expect("<release>")?;
    let release_text = decode_text(c.take(3)?, false);
    let release = release_text
        .parse::<u16>()
        .map_err(|_| DtaError::UnsupportedRelease(0))?;
    let layout = Layout::for_release(release)?;
    c.expect("</release>")?;

    c.expect("<byteorder>")?;
    let order = match c.take(3)? {
        b"MSF" => ByteOrder::Big,
        b"LSF" => ByteOrder::Little,
        other => return Err(DtaError::ByteOrder(String::from_utf8_lossy(other).into_owned())),
    };
    c.set_order(order);
    c.expect("</byteorder>")?;

    c.expect("<K>")?;
    let nvar = if layout.release == 119 { c.u32()? as usize } else { c.u16()? as usize };
    c.expect("</K>")?;

    c.expect("<N>")?;
    let nobs = if layout.release == 117 { c.u32()? as u64 } else { c.u64()? };
    let nobs = usize::try_from(nobs).map_err(|_| DtaError::Truncated {
        offset: c.position(),
        needed: usize::MAX,
    })?;
    c.expect("</N>")?;

    c.expect("<label>")?;
    let label_len = if layout.release == 117 { c.u8()? as usize } else { c.u16()? as usize };
    let data_label = read_text(&mut c, label_len, layout.utf8)?;
    c.expect("</label>")?;

    c.expect("<timestamp>")?;
    let ts_len = c.u8()? as usize;
    c.skip(ts_len)?;
    c.expect("</timestamp>")?;
    c.expect("</header>")?;

    // Sections are read in file order, so the offset map is not needed
    c.expect("<map>")?;
    c.skip(14 * 8)?;
    c.expect("</map>")?;

    c.expect("<variable_types>")?;
    let types = (0..nvar)
        .map(|i| c.u16().and_then(|code| var_type(code, i)))
        .collect::<Result<Vec<_>, _>>()?;
    c.expect("</variable_types>")?;

    c.expect("<varnames>")?;
    let names = read_fields(&mut c, nvar, layout.name_len, layout.utf8)?;
    c.expect("</varnames>")?;

    c.expect("<sortlist>")?;
    let sort_width = if layout.release == 119 { 4 } else { 2 };
    c.skip((nvar + 1) * sort_width)?;
    c.expect("</sortlist>")?;

    c.expect("<formats>")?;
    let formats = read_fields(&mut c, nvar, layout.format_len, layout.utf8)?;
    c.expect("</formats>")?;

    c.expect("<value_label_names>")?;
    let label_names = read_fields(&mut c, nvar, layout.name_len, layout.utf8)?;
    c.expect("</value_label_names>")?;

    c.expect("<variable_labels>")?;
    let var_labels = read_fields(&mut c, nvar, layout.var_label_len, layout.utf8)?;
    c.expect("</variable_labels>")?;

    c.expect("<characteristics>")?;
    while c.at("<ch>") {
        c.expect("<ch>")?;
        let len = c.u32()? as usize;
        c.skip(len)?;
        c.expect("</ch>")?;
    }
    c.expect("</characteristics>")?;

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

    c.expect("<data>")?;
    let builders = read_data(&mut c, &vars, nobs, layout.utf8, Some(layout.strl))?;
    c.expect("</data>")?;

    c.expect("<strls>")?;
    let strls = read_strls(&mut c, &layout)?;
    c.expect("</strls>")?;

    c.expect("<value_labels>")?;
    let mut value_labels = BTreeMap::new();
    while c.at("<lbl>") {
        c.expect("<lbl>")?;
        let len = c.u32()? as usize;
        let name = read_text(&mut c, layout.name_len, layout.utf8)?;
        c.skip(3)?;
        let labels = read_value_label_table(&mut c, len, layout.utf8)?;
        c.expect("</lbl>")?;
        value_labels.insert(name, labels);
    }
    c.expect("</value_labels>")?;
    c.expect("</stata_dta>")?;

    assemble(nobs, data_label, vars, builders, &strls, value_labels)
}

fn read_fields(
    c: &mut Cursor<'_>,
    count: usize,
    width: usize,
    utf8: bool,
) -> Result<Vec<String>, DtaError> {
    (0..count).map(|_| read_text(c, width, utf8)).collect()
}

/// `GSO` records: v (u32), o (u32 in 117, u64 later), type, length, contents
fn read_strls(c: &mut Cursor<'_>, layout: &Layout) -> Result<HashMap<(u64, u64), String>, DtaError> {
    const GSO_BINARY: u8 = 129;

    let mut strls = HashMap::new();
    while c.at("GSO") {
        c.expect("GSO")?;
        let v = u64::from(c.u32()?);
        let o = if layout.release == 117 { u64::from(c.u32()?) } else { c.u64()? };
        let kind = c.u8()?;
        let len = c.u32()? as usize;
        let contents = c.take(len)?;
        let text = if kind == GSO_BINARY {
            String::from_utf8_lossy(contents).into_owned()
        } else {
            decode_text(contents, layout.utf8)
        };
        strls.insert((v, o), text);
    }
    Ok(strls)
}
