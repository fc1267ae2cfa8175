// tests/form_tests.rs

mod common;

use common::read;
use sugarlisp::Form;

#[test]
fn read_forms_survive_json() {
    let forms = read("plus", "(print \"total\" a + 1.5 [true, null])\n{x: -2}").unwrap();
    assert_eq!(forms.len(), 2);
    for form in &forms {
        let back = Form::from_json_str(&form.to_json_string()).unwrap();
        assert_eq!(&back, form);
        assert_eq!(back.pretty(), form.pretty());
    }
}

#[test]
fn serde_and_canonical_json_agree() {
    let forms = read("core", "(say \"hi\" 2 sym)").unwrap();
    assert_eq!(serde_json::to_string(&forms[0]).unwrap(), forms[0].to_json_string());
    assert_eq!(forms[0].to_json_string(), r#"["say","\"hi\"",2.0,"sym"]"#);
}

#[test]
fn string_atoms_stay_distinct_from_symbols() {
    let form = Form::from_json_str(r#"["f", "\"f\""]"#).unwrap();
    let list = form.as_list().unwrap();
    assert_eq!(list.items[0], Form::symbol("f"));
    assert_eq!(list.items[1], Form::string("f"));
}

#[test]
fn long_forms_wrap_under_their_head() {
    let forms = read("core", "(define (area w h) (multiply w h))").unwrap();
    assert_eq!(forms[0].pretty_indented(80), "(define (area w h) (multiply w h))");
    assert_eq!(
        forms[0].pretty_indented(20),
        "(define\n  (area w h)\n  (multiply w h))"
    );
}

#[test]
fn extreme_numbers_keep_their_value_through_json() {
    let forms = read("core", "(range 1e300 -1.5e-300)").unwrap();
    let back = Form::from_json_str(&forms[0].to_json_string()).unwrap();
    assert_eq!(back, forms[0]);
    assert!(read("core", "(range 1e999)").is_err());
}
