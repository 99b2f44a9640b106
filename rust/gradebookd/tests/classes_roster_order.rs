use gradebookd::config::Config;
use gradebookd::model::Student;
use gradebookd::repo::hash_credential;
use gradebookd::{Error, Store};

fn store_with_class(config: Config) -> (Store, i64, i64) {
    let store = Store::open_in_memory().expect("store").with_config(config);
    let teacher = store
        .teachers()
        .register("Ms. Rivera", "Lincoln", &hash_credential("1234"))
        .expect("register");
    let classroom_id = store
        .classes()
        .add_classroom(teacher.id, "7A", "7", Some("2026-2027"))
        .expect("add classroom");
    (store, teacher.id, classroom_id)
}

#[test]
fn numeric_seats_first_then_name_fallback() {
    let (store, _, cid) = store_with_class(Config::default());
    let classes = store.classes();
    classes.add_student(cid, "Dana", Some("2"), None).expect("add");
    classes.add_student(cid, "Eli", Some("10"), None).expect("add");
    classes.add_student(cid, "Fay", Some("1"), None).expect("add");
    classes.add_student(cid, "Cole", None, None).expect("add");
    classes.add_student(cid, "Abe", Some("A"), None).expect("add");

    let names: Vec<String> = classes
        .students(cid)
        .expect("students")
        .into_iter()
        .map(|s| s.name)
        .collect();
    // "A" and the missing seat are both non-numeric, so they order by name.
    assert_eq!(names, vec!["Fay", "Dana", "Eli", "Abe", "Cole"]);
}

#[test]
fn padded_seats_are_trimmed_before_parsing() {
    let (store, _, cid) = store_with_class(Config::default());
    let mut padded = Student::new(cid, "Gus", Some(" 3 ".to_string()));
    padded.notes = Some("front row".to_string());
    store.classes().upsert_student(&padded).expect("upsert");
    store.classes().add_student(cid, "Hal", Some("20"), None).expect("add");

    let roster = store.classes().students(cid).expect("students");
    assert_eq!(roster[0].name, "Gus");
    assert_eq!(roster[0].seat_label.as_deref(), Some(" 3 "));
    assert_eq!(roster[0].notes.as_deref(), Some("front row"));
}

#[test]
fn blank_student_name_is_rejected() {
    let (store, _, cid) = store_with_class(Config::default());
    let res = store.classes().add_student(cid, "  ", Some("1"), None);
    assert!(matches!(res, Err(Error::InvalidInput(_))));
    assert!(store.classes().students(cid).expect("students").is_empty());
}

#[test]
fn batch_upsert_is_all_or_nothing() {
    let (store, _, cid) = store_with_class(Config::default());
    let batch = vec![
        Student::new(cid, "Ivy", None),
        Student::new(cid, "", None),
        Student::new(cid, "Jon", None),
    ];
    assert!(store.classes().upsert_students(&batch).is_err());
    assert!(store.classes().students(cid).expect("students").is_empty());
}

#[test]
fn upsert_with_existing_id_replaces_the_row() {
    let (store, _, cid) = store_with_class(Config::default());
    let id = store
        .classes()
        .add_student(cid, "Kim", Some("4"), None)
        .expect("add");
    let mut edited = store.classes().student(id).expect("get").expect("exists");
    edited.name = "Kimberly".to_string();
    edited.external_id = Some("S-0042".to_string());
    assert_eq!(store.classes().upsert_student(&edited).expect("upsert"), id);

    let roster = store.classes().students(cid).expect("students");
    assert_eq!(roster.len(), 1);
    assert_eq!(roster[0].name, "Kimberly");
    assert_eq!(roster[0].external_id.as_deref(), Some("S-0042"));
}

#[test]
fn classroom_defaults_to_configured_academic_year() {
    let config = Config {
        default_academic_year: "2030-2031".to_string(),
        ..Config::default()
    };
    let (store, teacher_id, _) = store_with_class(config);
    let cid = store
        .classes()
        .add_classroom(teacher_id, "8B", "8", None)
        .expect("add classroom");
    let classroom = store.classes().classroom(cid).expect("get").expect("exists");
    assert_eq!(classroom.academic_year, "2030-2031");

    let listed = store
        .classes()
        .classrooms_for_teacher(teacher_id)
        .expect("list");
    let names: Vec<&str> = listed.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["7A", "8B"]);
}

#[test]
fn classroom_for_unknown_teacher_is_not_found() {
    let store = Store::open_in_memory().expect("store");
    let res = store.classes().add_classroom(99, "Ghost", "1", None);
    assert!(matches!(res, Err(Error::NotFound(_))));
}
