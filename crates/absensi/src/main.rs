//! `absensi` - CLI for the school attendance store
//!
//! This binary records scans and manual marks, prints attendance views
//! and manages the directories, schools and backups of a local database.

#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

use std::collections::HashMap;

use anyhow::{anyhow, Context};
use chrono::{DateTime, Datelike, Local, Utc};
use clap::Parser;
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};
use tracing::debug;

use absensi::attendance::{AttendanceEngine, ManualMark, MonthlyReport, RecordFilter, ScanEvent};
use absensi::cli::{
    BackupCommand, Cli, Command, ConfigCommand, DailyCommand, MarkCommand, RecordsCommand,
    ReportCommand, ScanCommand, SchoolCommand, StudentCommand,
};
use absensi::model::{AttendanceRecord, AttendanceStatus, ScanMode, StudentInput};
use absensi::{init_logging, BackupManager, Config, SettingsStore, Storage, StudentDirectory};

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on verbosity
    init_logging(cli.verbosity());

    // Load configuration
    let config = Config::load_from(cli.config.clone())?;

    // Configuration commands never touch the database
    let command = match cli.command {
        Command::Config(config_cmd) => return handle_config(&config, config_cmd),
        other => other,
    };

    let database_path = config.database_path();
    let storage = Storage::open_with(&database_path, &config.storage_options())
        .with_context(|| format!("opening {}", database_path.display()))?;
    let engine = AttendanceEngine::new(&storage)
        .with_deadline(config.deadline()?)
        .with_default_semester(config.attendance.default_semester);

    match command {
        Command::CheckIn(scan_cmd) => handle_scan(&storage, &engine, scan_cmd, ScanMode::CheckIn),
        Command::CheckOut(scan_cmd) => handle_scan(&storage, &engine, scan_cmd, ScanMode::CheckOut),
        Command::Mark(mark_cmd) => handle_mark(&storage, &engine, mark_cmd),
        Command::Records(records_cmd) => handle_records(&storage, &engine, &records_cmd),
        Command::Daily(daily_cmd) => handle_daily(&storage, &engine, &daily_cmd),
        Command::Report(report_cmd) => handle_report(&engine, &report_cmd),
        Command::Student(student_cmd) => handle_student(&storage, student_cmd),
        Command::Backup(backup_cmd) => handle_backup(&storage, &backup_cmd),
        Command::School(school_cmd) => handle_school(&storage, &school_cmd),
        Command::Status(status_cmd) => handle_status(&storage, status_cmd.json),
        Command::Config(_) => Ok(()),
    }
}

/// Resolve a student argument to an id, by id or by NIS.
fn resolve_student(
    storage: &Storage,
    school_name: &str,
    student: &str,
    by_nis: bool,
) -> anyhow::Result<String> {
    let directory = StudentDirectory::new(storage);
    let found = if by_nis {
        directory.find_by_nis(school_name, student)?
    } else {
        directory
            .get(student)?
            .filter(|s| s.school_name == school_name)
    };
    found
        .map(|s| s.id)
        .ok_or_else(|| anyhow!("no student '{student}' in {school_name}"))
}

fn student_names(storage: &Storage, school_name: &str) -> anyhow::Result<HashMap<String, String>> {
    Ok(StudentDirectory::new(storage)
        .list(school_name, None)?
        .into_iter()
        .map(|s| (s.id, s.name))
        .collect())
}

fn local_time(instant: Option<DateTime<Utc>>) -> String {
    instant
        .map(|t| t.with_timezone(&Local).format("%H:%M:%S").to_string())
        .unwrap_or_default()
}

fn print_table(title: &str, mut table: Table) {
    table.with(Style::modern());
    println!("{title}:\n{table}");
}

fn handle_scan(
    storage: &Storage,
    engine: &AttendanceEngine<'_>,
    cmd: ScanCommand,
    mode: ScanMode,
) -> anyhow::Result<()> {
    let student_id = resolve_student(storage, &cmd.school, &cmd.student, cmd.nis)?;
    let timestamp = cmd.at.unwrap_or_else(|| Local::now().fixed_offset());

    let mut event = match mode {
        ScanMode::CheckIn => ScanEvent::check_in(student_id, cmd.subject, cmd.school, timestamp),
        ScanMode::CheckOut => ScanEvent::check_out(student_id, cmd.subject, cmd.school, timestamp),
    };
    if let Some(deadline) = cmd.deadline {
        event = event.with_deadline(deadline);
    }
    if let Some(semester) = cmd.semester {
        event = event.with_semester(semester.into());
    }

    let outcome = engine.record_attendance(&event)?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&outcome)?);
        return Ok(());
    }

    let record = &outcome.record;
    match outcome.mode {
        ScanMode::CheckIn => println!(
            "Checked in at {} ({})",
            local_time(record.check_in),
            record
                .timeliness
                .map_or_else(|| "-".to_string(), |t| t.to_string())
        ),
        ScanMode::CheckOut => println!("Checked out at {}", local_time(record.check_out)),
    }
    Ok(())
}

fn handle_mark(
    storage: &Storage,
    engine: &AttendanceEngine<'_>,
    cmd: MarkCommand,
) -> anyhow::Result<()> {
    let student_id = resolve_student(storage, &cmd.school, &cmd.student, cmd.nis)?;
    let mark = ManualMark {
        student_id,
        subject: cmd.subject,
        school_name: cmd.school,
        date: cmd.date.unwrap_or_else(|| Local::now().date_naive()),
        status: cmd.status.into(),
        semester: cmd.semester.map(Into::into),
    };

    engine.set_manual_attendance(&mark)?;
    match mark.status {
        Some(status) => println!("Marked {} on {}", AttendanceStatus::from(status), mark.date),
        None => println!("Cleared mark on {}", mark.date),
    }
    Ok(())
}

#[derive(Tabled)]
struct RecordRow {
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Student")]
    student: String,
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "In")]
    check_in: String,
    #[tabled(rename = "Out")]
    check_out: String,
    #[tabled(rename = "Timeliness")]
    timeliness: String,
    #[tabled(rename = "Semester")]
    semester: String,
}

impl RecordRow {
    fn new(record: &AttendanceRecord, names: &HashMap<String, String>) -> Self {
        Self {
            date: record.date.to_string(),
            student: names
                .get(&record.student_id)
                .cloned()
                .unwrap_or_else(|| record.student_id.clone()),
            subject: record.subject.clone(),
            status: record.status.to_string(),
            check_in: local_time(record.check_in),
            check_out: local_time(record.check_out),
            timeliness: record.timeliness.map(|t| t.to_string()).unwrap_or_default(),
            semester: record.semester.map(|s| s.to_string()).unwrap_or_default(),
        }
    }
}

fn handle_records(
    storage: &Storage,
    engine: &AttendanceEngine<'_>,
    cmd: &RecordsCommand,
) -> anyhow::Result<()> {
    let filter = RecordFilter {
        class_name: cmd.class.clone(),
        subject: cmd.subject.clone(),
        month: cmd.month,
        year: cmd.year,
        date: None,
    };
    let records = engine.get_attendance_records(&cmd.school, &filter)?;
    debug!("Listing {} records", records.len());

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&records)?);
        return Ok(());
    }
    if records.is_empty() {
        println!("No attendance records.");
        return Ok(());
    }

    let names = student_names(storage, &cmd.school)?;
    let rows: Vec<RecordRow> = records.iter().map(|r| RecordRow::new(r, &names)).collect();
    print_table(&format!("Attendance for {}", cmd.school), Table::new(rows));
    Ok(())
}

#[derive(Tabled)]
struct DailyRow {
    #[tabled(rename = "NIS")]
    nis: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Class")]
    class_name: String,
    #[tabled(rename = "Status")]
    status: String,
    #[tabled(rename = "Subject")]
    subject: String,
    #[tabled(rename = "In")]
    check_in: String,
    #[tabled(rename = "Out")]
    check_out: String,
}

fn handle_daily(
    storage: &Storage,
    engine: &AttendanceEngine<'_>,
    cmd: &DailyCommand,
) -> anyhow::Result<()> {
    let date = cmd.date.unwrap_or_else(|| Local::now().date_naive());
    let statuses = engine.daily_statuses(&cmd.school, cmd.class.as_deref(), date)?;

    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&statuses)?);
        return Ok(());
    }

    let students = StudentDirectory::new(storage).list(&cmd.school, cmd.class.as_deref())?;
    let rows: Vec<DailyRow> = students
        .into_iter()
        .map(|student| {
            let record = statuses.get(&student.id);
            DailyRow {
                nis: student.nis,
                name: student.name,
                class_name: student.class_name,
                status: record.map_or_else(|| "absent".to_string(), |r| r.status.to_string()),
                subject: record.map(|r| r.subject.clone()).unwrap_or_default(),
                check_in: local_time(record.and_then(|r| r.check_in)),
                check_out: local_time(record.and_then(|r| r.check_out)),
            }
        })
        .collect();

    print_table(&format!("{} on {date}", cmd.school), Table::new(rows));
    Ok(())
}

fn handle_report(engine: &AttendanceEngine<'_>, cmd: &ReportCommand) -> anyhow::Result<()> {
    let today = Local::now().date_naive();
    let year = cmd.year.unwrap_or_else(|| today.year());
    let month = cmd.month.unwrap_or_else(|| today.month());

    let report = engine.monthly_report(&cmd.school, &cmd.class, &cmd.subject, year, month)?;
    if cmd.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{} - {}", report.school_name, report.class_name);
    println!("Subject: {}", report.subject);
    println!("Period:  {:04}-{:02}", report.year, report.month);
    if let Some(teacher) = &report.teacher {
        match &teacher.nip {
            Some(nip) => println!("Teacher: {} ({nip})", teacher.name),
            None => println!("Teacher: {}", teacher.name),
        }
    }
    println!();
    println!("{}", report_table(&report));
    println!("✓ out  M in  T late  S sick  I permission  A absent  - Sunday");
    Ok(())
}

fn report_table(report: &MonthlyReport) -> Table {
    let mut builder = Builder::default();

    let mut header = vec!["No".to_string(), "Name".to_string(), "NIS".to_string()];
    header.extend((1..=report.days()).map(|day| day.to_string()));
    header.extend(["H", "T", "S", "I", "A"].map(String::from));
    builder.push_record(header);

    for (index, row) in report.rows.iter().enumerate() {
        let mut record = vec![
            (index + 1).to_string(),
            row.student.name.clone(),
            row.student.nis.clone(),
        ];
        record.extend(row.marks.iter().map(ToString::to_string));
        record.extend(
            [
                row.totals.present,
                row.totals.late,
                row.totals.sick,
                row.totals.permission,
                row.totals.absent,
            ]
            .map(|n| n.to_string()),
        );
        builder.push_record(record);
    }

    let mut table = builder.build();
    table.with(Style::modern());
    table
}

#[derive(Tabled)]
struct StudentRow {
    #[tabled(rename = "Id")]
    id: String,
    #[tabled(rename = "NIS")]
    nis: String,
    #[tabled(rename = "Name")]
    name: String,
    #[tabled(rename = "Class")]
    class_name: String,
    #[tabled(rename = "Parent phone")]
    parent_phone: String,
}

fn handle_student(storage: &Storage, cmd: StudentCommand) -> anyhow::Result<()> {
    let directory = StudentDirectory::new(storage);
    match cmd {
        StudentCommand::Add {
            school,
            name,
            class,
            nis,
            phone,
        } => {
            let student = directory.add(
                &school,
                StudentInput {
                    name,
                    class_name: class,
                    nis,
                    parent_phone: phone,
                },
            )?;
            println!("Added {} ({})", student.name, student.id);
        }
        StudentCommand::List {
            school,
            class,
            json,
        } => {
            let students = directory.list(&school, class.as_deref())?;
            if json {
                println!("{}", serde_json::to_string_pretty(&students)?);
            } else if students.is_empty() {
                println!("No students.");
            } else {
                let rows: Vec<StudentRow> = students
                    .into_iter()
                    .map(|s| StudentRow {
                        id: s.id,
                        nis: s.nis,
                        name: s.name,
                        class_name: s.class_name,
                        parent_phone: s.parent_phone.unwrap_or_default(),
                    })
                    .collect();
                print_table(&format!("Students of {school}"), Table::new(rows));
            }
        }
        StudentCommand::Delete { id } => {
            if directory.delete(&id)? {
                println!("Deleted student {id}.");
            } else {
                println!("No student {id}.");
            }
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct BackupRow {
    #[tabled(rename = "School")]
    school_name: String,
    #[tabled(rename = "Created")]
    created_at: String,
    #[tabled(rename = "Students")]
    students: usize,
    #[tabled(rename = "Teachers")]
    teachers: usize,
}

fn handle_backup(storage: &Storage, cmd: &BackupCommand) -> anyhow::Result<()> {
    let backups = BackupManager::new(storage);
    match cmd {
        BackupCommand::Create { school } => {
            let info = backups.backup_and_reset(school)?;
            println!(
                "Backed up {} students and {} teachers of {}.",
                info.students, info.teachers, info.school_name
            );
        }
        BackupCommand::Check { name } => {
            if backups.check_for_backup(name)? {
                println!("A backup exists for {name}.");
            } else {
                println!("No backup for {name}.");
            }
        }
        BackupCommand::Restore { name } => {
            if backups.restore(name)? {
                println!("Restored backup of {name}.");
            } else {
                println!("No backup for {name}; nothing restored.");
            }
        }
        BackupCommand::List { json } => {
            let list = backups.list_backups()?;
            if *json {
                println!("{}", serde_json::to_string_pretty(&list)?);
            } else if list.is_empty() {
                println!("No backups.");
            } else {
                let rows: Vec<BackupRow> = list
                    .into_iter()
                    .map(|b| BackupRow {
                        school_name: b.school_name,
                        created_at: b
                            .created_at
                            .with_timezone(&Local)
                            .format("%Y-%m-%d %H:%M")
                            .to_string(),
                        students: b.students,
                        teachers: b.teachers,
                    })
                    .collect();
                print_table("Backups", Table::new(rows));
            }
        }
    }
    Ok(())
}

#[derive(Tabled)]
struct SchoolRow {
    #[tabled(rename = "School")]
    name: String,
    #[tabled(rename = "QR attendance")]
    attendance: &'static str,
}

fn handle_school(storage: &Storage, cmd: &SchoolCommand) -> anyhow::Result<()> {
    let settings = SettingsStore::new(storage);
    match cmd {
        SchoolCommand::Register { name } => {
            settings.register_school(name)?;
            println!("Registered {name}.");
        }
        SchoolCommand::List => {
            let schools = settings.school_list()?;
            if schools.is_empty() {
                println!("No registered schools.");
                return Ok(());
            }
            let rows = schools
                .into_iter()
                .map(|name| {
                    let enabled = settings.attendance_enabled(&name)?;
                    Ok(SchoolRow {
                        name,
                        attendance: if enabled { "enabled" } else { "disabled" },
                    })
                })
                .collect::<anyhow::Result<Vec<_>>>()?;
            print_table("Schools", Table::new(rows));
        }
        SchoolCommand::Enable { name } => {
            settings.set_attendance_enabled(name, true)?;
            println!("QR attendance enabled for {name}.");
        }
        SchoolCommand::Disable { name } => {
            settings.set_attendance_enabled(name, false)?;
            println!("QR attendance disabled for {name}.");
        }
    }
    Ok(())
}

fn handle_status(storage: &Storage, json: bool) -> anyhow::Result<()> {
    let stats = storage.stats()?;
    if json {
        let status = serde_json::json!({
            "database_path": storage.path(),
            "schema_version": stats.schema_version,
            "students": stats.students,
            "teachers": stats.teachers,
            "attendance_records": stats.attendance_records,
            "operators": stats.operators,
            "backups": stats.backups,
            "db_size_bytes": stats.db_size_bytes,
        });
        println!("{}", serde_json::to_string_pretty(&status)?);
    } else {
        println!("absensi status");
        println!("--------------");
        println!("Database:       {}", storage.path().display());
        println!("Schema version: {}", stats.schema_version);
        println!("Students:       {}", stats.students);
        println!("Teachers:       {}", stats.teachers);
        println!("Records:        {}", stats.attendance_records);
        println!("Operators:      {}", stats.operators);
        println!("Backups:        {}", stats.backups);
        println!("Size:           {} bytes", stats.db_size_bytes);
    }
    Ok(())
}

fn handle_config(config: &Config, cmd: ConfigCommand) -> anyhow::Result<()> {
    match cmd {
        ConfigCommand::Show { json } => {
            if json {
                println!("{}", serde_json::to_string_pretty(config)?);
            } else {
                println!("Current Configuration");
                println!("=====================");
                println!();
                println!("[Storage]");
                println!("  Database path:      {}", config.database_path().display());
                println!();
                println!("[Attendance]");
                println!("  On-time deadline:   {}", config.attendance.on_time_deadline);
                println!("  Default semester:   {}", config.attendance.default_semester);
                println!();
                println!("[School]");
                println!(
                    "  Legacy name:        {}",
                    config.school.legacy_name.as_deref().unwrap_or("(none)")
                );
            }
        }
        ConfigCommand::Path => {
            println!("{}", Config::default_config_path().display());
        }
        ConfigCommand::Validate { file } => {
            let path = file.unwrap_or_else(Config::default_config_path);
            println!("Validating configuration: {}", path.display());
            match Config::load_from(Some(path)) {
                Ok(_) => println!("Configuration is valid."),
                Err(e) => println!("Configuration error: {e}"),
            }
        }
    }
    Ok(())
}
