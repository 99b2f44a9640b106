use calamine::{open_workbook, Data, Reader, Xlsx};
use gradebookd::config::{Config, PdfPagination};
use gradebookd::export::pdf::{render_report, PdfLayout};
use gradebookd::export::xlsx::REPORT_SHEET_NAME;
use gradebookd::export::{export_class_report, ExportFormat};
use gradebookd::model::{AttendanceRecord, AttendanceStatus, GradeRecord, Student};
use gradebookd::report::{ClassReport, MISSING_SCORE};
use gradebookd::repo::hash_credential;
use gradebookd::Store;

struct Fixture {
    store: Store,
    classroom_id: i64,
    ada: i64,
    ben: i64,
}

fn fixture(config: Config) -> Fixture {
    let store = Store::open_in_memory().expect("store").with_config(config);
    let teacher = store
        .teachers()
        .register("Ms. Rivera", "Lincoln", &hash_credential("1234"))
        .expect("register");
    let classroom_id = store
        .classes()
        .add_classroom(teacher.id, "7A", "7", None)
        .expect("add classroom");
    let ada = store
        .classes()
        .add_student(classroom_id, "Ada", Some("1"), None)
        .expect("add");
    let ben = store
        .classes()
        .add_student(classroom_id, "Ben", Some("2"), None)
        .expect("add");
    Fixture {
        store,
        classroom_id,
        ada,
        ben,
    }
}

fn grade(f: &Fixture, student_id: i64, exam: &str, score: f64, date: i64) -> GradeRecord {
    GradeRecord {
        id: 0,
        student_id,
        classroom_id: f.classroom_id,
        subject_name: "Math".to_string(),
        exam_name: exam.to_string(),
        score,
        max_score: 20.0,
        date,
    }
}

#[test]
fn one_exam_scored_for_one_student_shows_dash_for_the_other() {
    let f = fixture(Config::default());
    f.store
        .grades()
        .save(&[grade(&f, f.ada, "Midterm", 15.0, 1_000)])
        .expect("save grade");
    f.store
        .attendance()
        .save(&[AttendanceRecord {
            id: 0,
            student_id: f.ben,
            classroom_id: f.classroom_id,
            date: 86_400_000,
            status: AttendanceStatus::Absent,
        }])
        .expect("save attendance");

    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("reports").join("7A.xlsx");
    let summary =
        export_class_report(&f.store, f.classroom_id, &out, ExportFormat::Xlsx).expect("export");
    assert_eq!(summary.students, 2);
    assert_eq!(summary.exam_columns, 1);
    assert!(!out.with_file_name("7A.xlsx.partial").exists());

    let mut workbook: Xlsx<_> = open_workbook(&out).expect("open exported workbook");
    assert_eq!(workbook.sheet_names(), vec![REPORT_SHEET_NAME.to_string()]);
    let range = workbook
        .worksheet_range(REPORT_SHEET_NAME)
        .expect("report sheet");
    assert_eq!(range.get_size(), (3, 4));

    let header: Vec<String> = (0..4)
        .map(|c| match range.get_value((0, c)) {
            Some(Data::String(s)) => s.clone(),
            other => panic!("unexpected header cell {other:?}"),
        })
        .collect();
    assert_eq!(header, vec!["Name", "Seat Number", "Total Absences", "Midterm"]);

    assert_eq!(range.get_value((1, 0)), Some(&Data::String("Ada".to_string())));
    assert_eq!(range.get_value((1, 2)), Some(&Data::Float(0.0)));
    assert_eq!(range.get_value((1, 3)), Some(&Data::Float(15.0)));
    assert_eq!(range.get_value((2, 0)), Some(&Data::String("Ben".to_string())));
    assert_eq!(range.get_value((2, 1)), Some(&Data::String("2".to_string())));
    assert_eq!(range.get_value((2, 2)), Some(&Data::Float(1.0)));
    assert_eq!(
        range.get_value((2, 3)),
        Some(&Data::String(MISSING_SCORE.to_string()))
    );
}

#[test]
fn exam_columns_are_sorted_and_latest_attempt_wins() {
    let f = fixture(Config::default());
    f.store
        .grades()
        .save(&[
            grade(&f, f.ada, "Quiz 2", 7.0, 100),
            grade(&f, f.ada, "Midterm", 10.0, 500),
            grade(&f, f.ada, "Midterm", 18.0, 900),
            grade(&f, f.ada, "Midterm", 12.0, 300),
            grade(&f, f.ben, "Final", 19.5, 100),
        ])
        .expect("save grades");

    let report = ClassReport::snapshot(&f.store, f.classroom_id).expect("report");
    assert_eq!(report.exam_columns, vec!["Final", "Midterm", "Quiz 2"]);
    assert_eq!(report.rows[0].scores, vec![None, Some(18.0), Some(7.0)]);
    assert_eq!(report.rows[1].scores, vec![Some(19.5), None, None]);
}

fn crowded_report(rows: usize) -> ClassReport {
    let students: Vec<Student> = (0..rows)
        .map(|i| Student {
            id: i as i64 + 1,
            ..Student::new(1, format!("Student {i:03}"), Some((i + 1).to_string()))
        })
        .collect();
    ClassReport::build("Crowded", &students, &[], &[])
}

fn page_count(bytes: &[u8]) -> usize {
    let marker = b"/Type /Page ";
    bytes.windows(marker.len()).filter(|w| w == marker).count()
}

#[test]
fn long_roster_spills_onto_more_pages_by_default() {
    let report = crowded_report(80);
    let (bytes, summary) = render_report(&report, &PdfLayout::default());
    assert!(bytes.starts_with(b"%PDF-1.4"));
    assert!(summary.pages > 1);
    assert_eq!(summary.rows_drawn, 80);
    assert_eq!(summary.rows_dropped, 0);
    assert_eq!(page_count(&bytes), summary.pages);
}

#[test]
fn single_page_layout_truncates() {
    let report = crowded_report(80);
    let (bytes, summary) = render_report(&report, &PdfLayout::single_page());
    assert_eq!(summary.pages, 1);
    assert_eq!(page_count(&bytes), 1);
    assert!(summary.rows_drawn < 80);
    assert_eq!(summary.rows_drawn + summary.rows_dropped, 80);
}

#[test]
fn pdf_export_follows_configured_pagination() {
    let config = Config {
        pdf_pagination: PdfPagination::Truncate,
        ..Config::default()
    };
    let f = fixture(config);
    let dir = tempfile::tempdir().expect("tempdir");
    let out = dir.path().join("7A.pdf");
    let summary =
        export_class_report(&f.store, f.classroom_id, &out, ExportFormat::Pdf).expect("export");
    assert_eq!(summary.pages, Some(1));
    let bytes = std::fs::read(&out).expect("read pdf");
    assert!(bytes.starts_with(b"%PDF-1.4"));
    assert!(bytes.ends_with(b"%%EOF\n"));
    let title = b"(Class Report: 7A) Tj";
    assert!(bytes.windows(title.len()).any(|w| w == title));
}

#[test]
fn failed_export_leaves_no_file_behind() {
    let f = fixture(Config::default());
    let dir = tempfile::tempdir().expect("tempdir");
    // A regular file where the parent directory should be.
    let blocker = dir.path().join("blocked");
    std::fs::write(&blocker, b"x").expect("write blocker");
    let out = blocker.join("7A.xlsx");

    let res = export_class_report(&f.store, f.classroom_id, &out, ExportFormat::Xlsx);
    assert!(res.is_err());
    assert!(!out.exists());
    let leftovers: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read dir")
        .filter_map(|e| e.ok())
        .map(|e| e.file_name())
        .collect();
    assert_eq!(leftovers, vec![std::ffi::OsString::from("blocked")]);
}

#[test]
fn export_of_missing_classroom_is_not_found() {
    let f = fixture(Config::default());
    let dir = tempfile::tempdir().expect("tempdir");
    let res = export_class_report(&f.store, 9_999, &dir.path().join("x.pdf"), ExportFormat::Pdf);
    assert!(matches!(res, Err(gradebookd::Error::NotFound(_))));
}
