//! A small synthetic OULAD-style dataset written to disk for the
//! end-to-end training and serving tests.

use std::{fs, path::Path};

use crate::application::train_use_case::TrainConfig;
use crate::ml::predictor::ModelKind;

const REGIONS: [&str; 5] = ["East Anglian Region", "North", "North Region", "Scotland", "Wales"];
const EDUCATION: [&str; 3] = ["A Level or Equivalent", "HE Qualification", "Lower Than A Level"];
const AGE_BANDS: [&str; 3] = ["0-35", "35-55", "55<="];

/// Write the four CSV tables for `n` students into `dir`.
///
/// Two thirds of the students pass; passing students click a lot
/// and score well. Every tenth student has no clickstream rows and
/// every seventh has one unscored submission.
pub fn write_dataset(dir: &Path, n: u64) {
    let mut info = String::from(
        "code_module,code_presentation,id_student,gender,region,highest_education,imd_band,\
         age_band,num_of_prev_attempts,studied_credits,disability,final_result\n",
    );
    let mut vle = String::from("code_module,code_presentation,id_student,id_site,date,sum_click\n");
    let assessments = "code_module,code_presentation,id_assessment,assessment_type,date,weight\n\
                       AAA,2013J,1752,TMA,19,40\n\
                       AAA,2013J,1753,Exam,200,60\n";
    let mut submissions = String::from("id_assessment,id_student,date_submitted,is_banked,score\n");

    for id in 1..=n {
        let passes = id % 3 != 0;
        let result = match (passes, id % 2) {
            (true, 0)  => "Distinction",
            (true, _)  => "Pass",
            (false, 0) => "Withdrawn",
            (false, _) => "Fail",
        };

        info.push_str(&format!(
            "AAA,2013J,{id},{},{},{},20-30%,{},{},{},N,{result}\n",
            if id % 2 == 0 { "F" } else { "M" },
            REGIONS[(id % 5) as usize],
            EDUCATION[(id % 3) as usize],
            AGE_BANDS[((id / 3) % 3) as usize],
            id % 2,
            60 + 30 * (id % 3),
        ));

        if id % 10 != 0 {
            let clicks = if passes { 400 + 7 * id } else { 10 + id % 9 };
            vle.push_str(&format!("AAA,2013J,{id},546614,-5,{}\n", clicks / 2));
            vle.push_str(&format!("AAA,2013J,{id},546615,3,{}\n", clicks - clicks / 2));
        }

        let score = if passes { 65 + id % 30 } else { 20 + id % 25 };
        submissions.push_str(&format!("1752,{id},18,0,{score}\n"));
        if id % 7 == 0 {
            submissions.push_str(&format!("1753,{id},199,0,\n"));
        } else {
            submissions.push_str(&format!("1753,{id},199,0,{}\n", score.saturating_sub(5)));
        }
    }

    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join("studentInfo.csv"), info).unwrap();
    fs::write(dir.join("studentVle.csv"), vle).unwrap();
    fs::write(dir.join("assessments.csv"), assessments).unwrap();
    fs::write(dir.join("studentAssessment.csv"), submissions).unwrap();
}

/// A TrainConfig small enough to run in a unit test.
pub fn quick_config(data: &Path, out: &Path, kind: ModelKind) -> TrainConfig {
    let mut cfg = TrainConfig {
        data_dir:          data.display().to_string(),
        artifact_dir:      out.display().to_string(),
        model:             kind,
        importance_sample: 20,
        ..Default::default()
    };
    cfg.params.forest.n_trees        = 15;
    cfg.params.boosting.n_estimators = 20;
    cfg.params.network.epochs        = 150;
    cfg.explainer.n_permutations     = 4;
    cfg.explainer.max_background     = 10;
    cfg
}
