use co_attainment::copo::CoPoMapping;
use co_attainment::engine::{
    compute, ComponentInput, ComputationContext, ComputationInput, IndirectScores, SheetInput,
};
use co_attainment::types::{
    AttainmentLevel, CellValue, CoLabel, PoLabel, RawSheet, SheetBag, Threshold,
};
use co_attainment::{build_report_tables, loader, AggregationPolicy};

fn numbers(values: &[f64]) -> Vec<CellValue> {
    values.iter().map(|v| CellValue::Number(*v)).collect()
}

/// One sheet with a single CO column: out-of first, then the students.
fn co_sheet(name: &str, co: u32, out_of: f64, marks: &[f64]) -> SheetInput {
    let mut values = vec![CellValue::Number(out_of)];
    values.extend(numbers(marks));
    let mut bag = SheetBag::new(name);
    bag.push(format!("Total of CO{co}"), values);
    SheetInput::Columns(bag)
}

fn component(name: &str, sheets: Vec<SheetInput>) -> ComponentInput {
    ComponentInput {
        name: name.to_string(),
        sheets,
    }
}

/// Two components that land CO1 on level 3 and level 2 respectively.
fn two_component_input() -> ComputationInput {
    let mut mapping = CoPoMapping::new();
    mapping.set(CoLabel(1), PoLabel::Po(1), 3);
    ComputationInput {
        components: vec![
            component("Quiz", vec![co_sheet("A", 1, 10.0, &[9.0, 8.0, 7.0, 6.0, 10.0])]),
            component("End Term", vec![co_sheet("A", 1, 10.0, &[9.0, 8.0, 7.0, 2.0, 1.0])]),
        ],
        co_statements: vec!["Explain lists".into()],
        context: ComputationContext {
            threshold: Threshold(50.0),
            weights: vec![62.5, 37.5],
            policy: AggregationPolicy::Weighted,
            indirect: IndirectScores::uniform(2.0),
            mapping,
        },
        ..Default::default()
    }
}

#[test]
fn ten_students_out_of_twenty() {
    let marks = [12.0, 15.0, 10.0, 18.0, 11.0, 20.0, 4.0, 9.0, 3.0, 0.0];
    let input = ComputationInput {
        components: vec![component("Mid Term", vec![co_sheet("Sec A", 1, 20.0, &marks)])],
        context: ComputationContext {
            weights: vec![100.0],
            ..Default::default()
        },
        ..Default::default()
    };
    let snap = compute(&input);
    let pooled = &snap.components[0].per_co[&CoLabel(1)];
    assert_eq!(pooled.total_students, 10);
    assert_eq!(pooled.above_count, 6);
    assert!((pooled.percentage - 60.0).abs() < 1e-9);
    assert_eq!(pooled.level, AttainmentLevel::Moderate);

    let tables = build_report_tables(&snap);
    let sheet = &tables.sheet_attainment[0];
    assert_eq!(sheet.title, "Mid Term / Sec A - Attainment");
    assert!(sheet.string_rows().iter().any(|r| r.iter().any(|c| c == "60.00")));
}

#[test]
fn weighted_chain_reaches_the_po_cells() {
    let snap = compute(&two_component_input());
    let outcome = snap.outcome(CoLabel(1)).unwrap();
    assert_eq!(
        outcome.component_levels,
        vec![AttainmentLevel::High, AttainmentLevel::Moderate]
    );
    assert!((outcome.aggregate.attainment_level - 2.625).abs() < 1e-9);
    assert!((outcome.aggregate.overall_attainment - 2.5).abs() < 1e-9);
    assert!((outcome.aggregate.overall_percentage - 250.0 / 3.0).abs() < 1e-9);
    assert!(outcome.target_met);

    let row = &snap.copo.rows[0];
    assert!((row.cells[PoLabel::Po(1).index()] - 2.5).abs() < 1e-9);
    assert_eq!(row.cells[PoLabel::Po(2).index()], 0.0);
    assert_eq!(snap.copo.average(PoLabel::Po(2)), None);

    let tables = build_report_tables(&snap);
    let first = &tables.copo_attainment.string_rows()[0];
    assert_eq!(first[0], "CO1");
    assert!(first.iter().any(|c| c == "2.50"));
    assert!(first.iter().any(|c| c.is_empty()));
    assert_eq!(tables.co_summary[0].overall_percentage, "83.33");
}

#[test]
fn unweighted_policy_takes_the_plain_mean() {
    let mut input = two_component_input();
    input.context.policy = AggregationPolicy::Unweighted;
    let snap = compute(&input);
    let outcome = snap.outcome(CoLabel(1)).unwrap();
    assert!((outcome.aggregate.attainment_level - 2.5).abs() < 1e-9);
}

#[test]
fn compute_is_idempotent() {
    let input = two_component_input();
    let first = compute(&input);
    let second = compute(&input);
    assert_eq!(first, second);
    assert_eq!(build_report_tables(&first), build_report_tables(&second));
}

#[test]
fn empty_sheet_contributes_no_cos() {
    let input = ComputationInput {
        components: vec![component(
            "Quiz",
            vec![SheetInput::Rows(RawSheet::new("Blank", vec![vec![CellValue::Empty]]))],
        )],
        context: ComputationContext {
            weights: vec![100.0],
            ..Default::default()
        },
        ..Default::default()
    };
    let snap = compute(&input);
    assert!(snap.components[0].per_co.is_empty());
    assert!(snap.outcomes.is_empty());
    assert!(snap.copo.rows.is_empty());
}

#[test]
fn sheet_without_co_columns_leaves_pooled_counts_alone() {
    let mut roster = SheetBag::new("Roster");
    roster.push("StudentName", vec![CellValue::Empty, CellValue::text("Late joiner")]);
    roster.push("Remarks", vec![CellValue::Empty, CellValue::text("absent")]);

    let input = ComputationInput {
        components: vec![component(
            "Quiz",
            vec![
                co_sheet("A", 1, 10.0, &[9.0, 6.0, 2.0, 7.0]),
                SheetInput::Columns(roster),
            ],
        )],
        context: ComputationContext {
            weights: vec![100.0],
            ..Default::default()
        },
        ..Default::default()
    };
    let snap = compute(&input);
    let quiz = &snap.components[0];
    assert!(quiz.sheets[1].per_co.is_empty());

    let real = &quiz.sheets[0].per_co[&CoLabel(1)];
    let pooled = &quiz.per_co[&CoLabel(1)];
    assert_eq!(pooled.above_count, real.above_count);
    assert_eq!(pooled.total_students, real.total_students);
    assert_eq!((pooled.above_count, pooled.total_students), (3, 4));
    assert_eq!(pooled.sheets_assessed, 1);
    assert_eq!(pooled.level, AttainmentLevel::Moderate);
}

#[test]
fn raising_the_threshold_never_adds_students() {
    let marks = [3.0, 7.5, 10.0, 12.0, 14.0, 16.5, 19.0, 20.0];
    let mut previous = usize::MAX;
    for pct in [0.0, 25.0, 40.0, 50.0, 60.0, 75.0, 90.0, 100.0] {
        let input = ComputationInput {
            components: vec![component("Quiz", vec![co_sheet("A", 2, 20.0, &marks)])],
            context: ComputationContext {
                threshold: Threshold(pct),
                weights: vec![100.0],
                ..Default::default()
            },
            ..Default::default()
        };
        let above = compute(&input).components[0].per_co[&CoLabel(2)].above_count;
        assert!(above <= previous, "threshold {pct}% raised the count");
        previous = above;
    }
}

#[test]
fn csv_upload_runs_end_to_end() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sec_a.csv");
    std::fs::write(
        &path,
        ",,Total of CO1,Total of CO2,Total Marks\n\
         RollNo,StudentName,10,10,20\n\
         1,Asha,8,2,10\n\
         2,Ravi,6,9,15\n\
         3,Meena,AB,AB,0\n\
         4,Kiran,9,5,14\n\
         Total:,,23,16,39\n",
    )
    .unwrap();

    let input = ComputationInput {
        components: vec![component("Mid Term", loader::load_sheets(&path).unwrap())],
        co_statements: vec!["one".into(), "two".into(), "three".into()],
        context: ComputationContext {
            weights: vec![100.0],
            ..Default::default()
        },
        ..Default::default()
    };
    let snap = compute(&input);
    let normalized = &snap.normalized[0][0];
    assert_eq!(normalized.student_count(), 4);
    assert_eq!(normalized.student_names.student(0), Some(&CellValue::text("Asha")));

    let co1 = &snap.components[0].per_co[&CoLabel(1)];
    assert_eq!((co1.above_count, co1.total_students), (3, 4));
    assert_eq!(co1.level, AttainmentLevel::Moderate);
    let co2 = &snap.components[0].per_co[&CoLabel(2)];
    assert_eq!((co2.above_count, co2.total_students), (2, 4));
    assert_eq!(co2.level, AttainmentLevel::Moderate);

    // CO3 has a statement but no column.
    let co3 = snap.outcome(CoLabel(3)).unwrap();
    assert_eq!(co3.component_levels, vec![AttainmentLevel::Unattained]);
    assert_eq!(co3.aggregate.overall_attainment, 0.0);
}
