use gradebookd::model::{AttendanceRecord, AttendanceStatus, GradeRecord, Student};
use gradebookd::repo::hash_credential;
use gradebookd::Store;
use std::cell::RefCell;
use std::rc::Rc;

fn store_with_class() -> (Store, i64, i64) {
    let store = Store::open_in_memory().expect("store");
    let teacher = store
        .teachers()
        .register("Mr. Okafor", "North", &hash_credential("1234"))
        .expect("register");
    let cid = store
        .classes()
        .add_classroom(teacher.id, "9C", "9", None)
        .expect("add classroom");
    (store, teacher.id, cid)
}

fn recorder<T: Clone + 'static>() -> (Rc<RefCell<Vec<Vec<T>>>>, impl FnMut(&[T]) + 'static) {
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |rows: &[T]| sink.borrow_mut().push(rows.to_vec()))
}

#[test]
fn student_watch_emits_initially_and_after_each_commit() {
    let (store, _, cid) = store_with_class();
    let (seen, on_change) = recorder::<Student>();
    store
        .classes()
        .watch_students(cid, on_change)
        .expect("watch");
    assert_eq!(seen.borrow().len(), 1);
    assert!(seen.borrow()[0].is_empty());

    store.classes().add_student(cid, "Ada", Some("2"), None).expect("add");
    store.classes().add_student(cid, "Ben", Some("1"), None).expect("add");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 3);
    let latest: Vec<&str> = seen[2].iter().map(|s| s.name.as_str()).collect();
    assert_eq!(latest, vec!["Ben", "Ada"]);
}

#[test]
fn other_classrooms_do_not_trigger_the_watch() {
    let (store, teacher_id, cid) = store_with_class();
    let other = store
        .classes()
        .add_classroom(teacher_id, "9D", "9", None)
        .expect("add classroom");
    let (seen, on_change) = recorder::<Student>();
    store
        .classes()
        .watch_students(cid, on_change)
        .expect("watch");

    store.classes().add_student(other, "Cy", None, None).expect("add");
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn unsubscribed_watch_goes_quiet() {
    let (store, _, cid) = store_with_class();
    let (seen, on_change) = recorder::<Student>();
    let id = store
        .classes()
        .watch_students(cid, on_change)
        .expect("watch");
    assert_eq!(store.subscription_count(), 1);
    assert!(store.unsubscribe(id));
    assert!(!store.unsubscribe(id));

    store.classes().add_student(cid, "Dee", None, None).expect("add");
    assert_eq!(seen.borrow().len(), 1);
    assert_eq!(store.subscription_count(), 0);
}

#[test]
fn failed_write_does_not_notify() {
    let (store, _, cid) = store_with_class();
    let (seen, on_change) = recorder::<Student>();
    store
        .classes()
        .watch_students(cid, on_change)
        .expect("watch");

    let batch = vec![Student::new(cid, "Eve", None), Student::new(cid, " ", None)];
    assert!(store.classes().upsert_students(&batch).is_err());
    assert_eq!(seen.borrow().len(), 1);
}

#[test]
fn classroom_watch_follows_the_teacher() {
    let (store, teacher_id, _) = store_with_class();
    let seen = Rc::new(RefCell::new(Vec::new()));
    let sink = seen.clone();
    store
        .classes()
        .watch_classrooms(teacher_id, move |rows| {
            sink.borrow_mut()
                .push(rows.iter().map(|c| c.name.clone()).collect::<Vec<_>>())
        })
        .expect("watch");
    store
        .classes()
        .add_classroom(teacher_id, "10A", "10", None)
        .expect("add classroom");
    assert_eq!(
        *seen.borrow(),
        vec![vec!["9C".to_string()], vec!["9C".to_string(), "10A".to_string()]]
    );
}

#[test]
fn attendance_watch_for_date_sees_only_that_day() {
    let (store, _, cid) = store_with_class();
    let sid = store.classes().add_student(cid, "Flo", None, None).expect("add");
    let day = 1_700_000_000_000;
    let (seen, on_change) = recorder::<AttendanceRecord>();
    store
        .attendance()
        .watch_for_date(cid, day, on_change)
        .expect("watch");

    let record = |date| AttendanceRecord {
        id: 0,
        student_id: sid,
        classroom_id: cid,
        date,
        status: AttendanceStatus::Late,
    };
    store
        .attendance()
        .save(&[record(day), record(day + 86_400_000)])
        .expect("save");

    let seen = seen.borrow();
    assert_eq!(seen.len(), 2);
    assert_eq!(seen[1].len(), 1);
    assert_eq!(seen[1][0].status, AttendanceStatus::Late);
}

#[test]
fn listener_may_unsubscribe_itself_while_running() {
    let (store, _, cid) = store_with_class();
    let store = Rc::new(store);
    let hits = Rc::new(RefCell::new(0));
    let own_id = Rc::new(RefCell::new(None));

    let (h, id_slot, weak_store) = (hits.clone(), own_id.clone(), Rc::downgrade(&store));
    let id = store
        .classes()
        .watch_students(cid, move |_| {
            *h.borrow_mut() += 1;
            if let (Some(id), Some(store)) = (*id_slot.borrow(), weak_store.upgrade()) {
                store.unsubscribe(id);
            }
        })
        .expect("watch");
    *own_id.borrow_mut() = Some(id);

    store.classes().add_student(cid, "Gil", None, None).expect("add");
    store.classes().add_student(cid, "Hoa", None, None).expect("add");
    assert_eq!(*hits.borrow(), 2);
    assert_eq!(store.subscription_count(), 0);
}

fn lengths<T>(seen: &Rc<RefCell<Vec<Vec<T>>>>) -> Vec<usize> {
    seen.borrow().iter().map(Vec::len).collect()
}

#[test]
fn moving_a_student_notifies_the_classroom_it_left() {
    let (store, teacher_id, cid) = store_with_class();
    let other = store
        .classes()
        .add_classroom(teacher_id, "9D", "9", None)
        .expect("add classroom");
    let sid = store.classes().add_student(cid, "Gus", Some("4"), None).expect("add");
    let (left, on_left) = recorder::<Student>();
    let (joined, on_joined) = recorder::<Student>();
    store.classes().watch_students(cid, on_left).expect("watch");
    store.classes().watch_students(other, on_joined).expect("watch");

    let mut moved = store.classes().student(sid).expect("read").expect("student");
    moved.classroom_id = other;
    store.classes().upsert_student(&moved).expect("upsert");
    assert_eq!(lengths(&left), vec![1, 0]);
    assert_eq!(lengths(&joined), vec![0, 1]);

    // Batch moves behave the same way.
    moved.classroom_id = cid;
    store.classes().upsert_students(&[moved]).expect("upsert batch");
    assert_eq!(lengths(&left), vec![1, 0, 1]);
    assert_eq!(lengths(&joined), vec![0, 1, 0]);
}

#[test]
fn moving_attendance_and_grades_notifies_old_owners() {
    let (store, teacher_id, cid) = store_with_class();
    let other = store
        .classes()
        .add_classroom(teacher_id, "9D", "9", None)
        .expect("add classroom");
    let ada = store.classes().add_student(cid, "Ada", None, None).expect("add");
    let ben = store.classes().add_student(cid, "Ben", None, None).expect("add");

    let mut record = AttendanceRecord {
        id: 0,
        student_id: ada,
        classroom_id: cid,
        date: 1_700_000_000_000,
        status: AttendanceStatus::Absent,
    };
    record.id = store.attendance().save(&[record.clone()]).expect("save")[0];
    let (attendance, on_attendance) = recorder::<AttendanceRecord>();
    store.attendance().watch_all(cid, on_attendance).expect("watch");
    record.classroom_id = other;
    store.attendance().save(&[record]).expect("move");
    assert_eq!(lengths(&attendance), vec![1, 0]);

    let mut grade = GradeRecord {
        id: 0,
        student_id: ada,
        classroom_id: cid,
        subject_name: "Math".to_string(),
        exam_name: "Quiz".to_string(),
        score: 8.0,
        max_score: 10.0,
        date: 1_000,
    };
    grade.id = store.grades().save(&[grade.clone()]).expect("save")[0];
    let (by_student, on_student) = recorder::<GradeRecord>();
    let (by_class, on_class) = recorder::<GradeRecord>();
    store.grades().watch_for_student(ada, on_student).expect("watch");
    store.grades().watch_all(cid, on_class).expect("watch");
    grade.student_id = ben;
    grade.classroom_id = other;
    store.grades().replace_exam(&[grade]).expect("move");
    assert_eq!(lengths(&by_student), vec![1, 0]);
    assert_eq!(lengths(&by_class), vec![1, 0]);
}
