use courier_ingest::{Cell, IngestError, SendMode, ingest, ingest_text};

#[test]
fn integral_float_renders_like_integer() {
    assert_eq!(Cell::Float(5.0).render().as_deref(), Some("5"));
    assert_eq!(Cell::Int(5).render().as_deref(), Some("5"));
    assert_eq!(Cell::Float(5.5).render().as_deref(), Some("5.5"));
    assert_eq!(Cell::Text(" 5.0 ".into()).render().as_deref(), Some("5.0"));
    assert_eq!(Cell::Float(f64::NAN).render(), None);
    assert_eq!(Cell::Text("   ".into()).render(), None);
}

#[test]
fn csv_column_mode_skips_missing_cells() {
    let src = b"phone,code\n5551234.0,12\n,NaN\n5559999,7.5\n";
    let table = ingest("list.csv", src).unwrap();
    assert_eq!(table.columns(), ["phone", "code"]);
    assert_eq!(table.len(), 3);

    let plan = table.plan(SendMode::Columns);
    assert_eq!(plan.len(), 2);
    assert_eq!(plan[0].label, "phone");
    assert_eq!(plan[0].messages, vec!["5551234", "5559999"]);
    assert_eq!(plan[1].messages, vec!["12", "7.5"]);
}

#[test]
fn row_mode_prefixes_only_with_several_columns() {
    let multi = ingest("multi.csv", b"name,phone\nalice,555\n,\nbob,\n").unwrap();
    let plan = multi.plan(SendMode::Rows);
    assert_eq!(plan.len(), 1);
    assert_eq!(plan[0].messages, vec!["name: alice | phone: 555", "name: bob"]);

    let single = ingest("single.csv", b"phone\n555\n777.0\n").unwrap();
    assert_eq!(single.plan(SendMode::Rows)[0].messages, vec!["555", "777"]);
}

#[test]
fn ragged_csv_rows_are_padded() {
    let table = ingest("ragged.csv", b"a,b,c\n1\n1,2,3\n").unwrap();
    assert_eq!(table.rows()[0], vec![Cell::Int(1), Cell::Empty, Cell::Empty]);
}

#[test]
fn text_file_one_value_per_line() {
    let table = ingest("numbers.TXT", b"  +1 555 0100 \n\n0012\n").unwrap();
    assert_eq!(table.columns(), ["data"]);
    let plan = table.plan(SendMode::Columns);
    assert_eq!(plan[0].messages, vec!["+1 555 0100", "0012"]);
}

#[test]
fn typed_decimals_are_sent_as_written() {
    let plan = ingest_text("12.000\n 7.0 \n7.50\n").plan(SendMode::Columns);
    assert_eq!(plan[0].messages, vec!["12.000", "7.0", "7.50"]);

    let csv = ingest("typed.csv", b"code\n12.000\n").unwrap();
    assert_eq!(csv.plan(SendMode::Columns)[0].messages, vec!["12"]);
}

#[test]
fn manual_text_matches_text_file() {
    let src = "first\n\n second \n";
    let from_text = ingest_text(src);
    let from_file = ingest("manual.txt", src.as_bytes()).unwrap();
    assert_eq!(from_text, from_file);
}

#[test]
fn unsupported_extension_is_rejected() {
    let err = ingest("contacts.json", b"[]").unwrap_err();
    assert!(matches!(err, IngestError::UnsupportedExtension { .. }));
    assert_eq!(err.to_string(), "unsupported file type: .json");

    let legacy = ingest("list.xls", b"\xd0\xcf\x11\xe0").unwrap_err();
    assert!(matches!(legacy, IngestError::UnsupportedExtension { .. }));
}

#[test]
fn invalid_utf8_text_is_rejected() {
    let err = ingest("broken.txt", &[0xff, 0xfe, 0x00]).unwrap_err();
    assert!(matches!(err, IngestError::Encoding(_)));
}

#[test]
fn spreadsheet_first_sheet_with_header() {
    let mut workbook = rust_xlsxwriter::Workbook::new();
    let sheet = workbook.add_worksheet();
    sheet.write_string(0, 0, "phone").unwrap();
    sheet.write_string(0, 1, "note").unwrap();
    sheet.write_number(1, 0, 5551234.0).unwrap();
    sheet.write_string(1, 1, "vip").unwrap();
    sheet.write_number(2, 0, 12.5).unwrap();
    let bytes = workbook.save_to_buffer().unwrap();

    let table = ingest("book.xlsx", &bytes).unwrap();
    assert_eq!(table.columns(), ["phone", "note"]);
    let plan = table.plan(SendMode::Columns);
    assert_eq!(plan[0].messages, vec!["5551234", "12.5"]);
    assert_eq!(plan[1].messages, vec!["vip"]);
    assert_eq!(
        table.plan(SendMode::Rows)[0].messages,
        vec!["phone: 5551234 | note: vip", "phone: 12.5"]
    );
}

#[test]
fn garbage_spreadsheet_is_an_error() {
    let err = ingest("book.xlsx", b"not a zip archive").unwrap_err();
    assert!(matches!(err, IngestError::Spreadsheet(_)));
}
