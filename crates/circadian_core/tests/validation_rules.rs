use circadian_core::model::record::parse_timestamp;
use circadian_core::validation::{
    FieldErrorKind, RecordField, DIASTOLIC_RANGE, ENERGY_RANGE, HEART_RATE_RANGE, SYSTOLIC_RANGE,
};
use circadian_core::{parse_entry, validate, MeasurementRecord, RawEntry, ValidationWarning};

fn reading(heart_rate: i32, systolic: i32, diastolic: i32, energy: i32) -> MeasurementRecord {
    MeasurementRecord::new(
        "alice",
        parse_timestamp("2024-01-01 08:00:00").unwrap(),
        heart_rate,
        systolic,
        diastolic,
        energy,
    )
}

fn raw(heart_rate: &str, systolic: &str, diastolic: &str, energy: &str) -> RawEntry {
    RawEntry {
        person_id: "alice".to_string(),
        timestamp: "2024-01-01 08:00:00".to_string(),
        heart_rate: heart_rate.to_string(),
        systolic_bp: systolic.to_string(),
        diastolic_bp: diastolic.to_string(),
        energy_level: energy.to_string(),
        notes: String::new(),
    }
}

#[test]
fn accepts_exactly_when_every_field_is_in_range_and_diastolic_is_lower() {
    let heart_rates = [29, 30, 75, 200, 201];
    let systolics = [69, 70, 120, 250, 251];
    let diastolics = [39, 40, 80, 150, 151];
    let energies = [0, 1, 5, 10, 11];

    for heart_rate in heart_rates {
        for systolic in systolics {
            for diastolic in diastolics {
                for energy in energies {
                    let expected = HEART_RATE_RANGE.contains(&heart_rate)
                        && SYSTOLIC_RANGE.contains(&systolic)
                        && DIASTOLIC_RANGE.contains(&diastolic)
                        && ENERGY_RANGE.contains(&energy)
                        && diastolic < systolic;
                    let report = validate(&reading(heart_rate, systolic, diastolic, energy));
                    assert_eq!(
                        report.is_accepted(),
                        expected,
                        "hr={heart_rate} sys={systolic} dia={diastolic} energy={energy}"
                    );
                }
            }
        }
    }
}

#[test]
fn heart_rate_outside_range_is_reported_on_heart_rate() {
    for heart_rate in [0, 29, 201, 250] {
        let errors = validate(&reading(heart_rate, 120, 80, 5))
            .into_result()
            .unwrap_err();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors.errors()[0].field, RecordField::HeartRate);
        assert!(matches!(
            errors.errors()[0].kind,
            FieldErrorKind::OutOfRange { min: 30, max: 200, .. }
        ));
    }
}

#[test]
fn diastolic_not_below_systolic_is_a_separate_error() {
    let errors = validate(&reading(70, 120, 120, 5))
        .into_result()
        .unwrap_err();

    assert!(errors.has_field(RecordField::BloodPressure));
    assert!(!errors.has_field(RecordField::SystolicBp));
    assert!(!errors.has_field(RecordField::DiastolicBp));
}

#[test]
fn parse_entry_reports_every_bad_field_together() {
    let mut entry = raw("fast", "", "80", "12");
    entry.person_id = "a".to_string();
    entry.timestamp = "01/02/2024".to_string();

    let errors = parse_entry(&entry).unwrap_err();

    for field in [
        RecordField::PersonId,
        RecordField::Timestamp,
        RecordField::HeartRate,
        RecordField::SystolicBp,
        RecordField::EnergyLevel,
    ] {
        assert!(errors.has_field(field), "missing error for {}", field.as_str());
    }
    assert_eq!(errors.messages().len(), errors.len());
}

#[test]
fn parse_entry_trims_numbers_and_keeps_notes() {
    let mut entry = raw(" 65 ", "120", "80", "7");
    entry.timestamp = "2024-01-01 08:00".to_string();
    entry.notes = "  fasting ".to_string();

    let record = parse_entry(&entry).unwrap();

    assert_eq!(record.heart_rate, 65);
    assert_eq!(record.timestamp, parse_timestamp("2024-01-01 08:00:00").unwrap());
    assert_eq!(record.notes.as_deref(), Some("  fasting "));
}

#[test]
fn accepted_readings_carry_advisory_warnings() {
    let report = validate(&reading(55, 150, 95, 9));

    assert!(report.is_accepted());
    assert_eq!(
        report.warnings,
        vec![
            ValidationWarning::HighBloodPressure,
            ValidationWarning::HighEnergyLowHeartRate
        ]
    );
    assert!(validate(&reading(70, 120, 80, 5)).warnings.is_empty());
}

#[test]
fn person_id_rules() {
    let too_long = "x".repeat(51);
    for (person_id, kind) in [
        ("", FieldErrorKind::Missing),
        ("a", FieldErrorKind::TooShort { min: 2 }),
        (too_long.as_str(), FieldErrorKind::TooLong { max: 50 }),
        ("al ice", FieldErrorKind::InvalidCharacters),
    ] {
        let mut record = reading(70, 120, 80, 5);
        record.person_id = person_id.to_string();
        let errors = validate(&record).into_result().unwrap_err();
        assert_eq!(errors.errors()[0].field, RecordField::PersonId);
        assert_eq!(errors.errors()[0].kind, kind);
    }
}
