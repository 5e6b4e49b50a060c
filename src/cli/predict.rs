// Ultralytics 🚀 AGPL-3.0 License - https://ultralytics.com/license

use sign_inference::{
    Device, InferenceConfig, PredictionResult, ReplayDetector, SharedDetector, SignClassifier,
    Source, VERSION,
};

use crate::cli::args::{ConfigArgs, PredictArgs};
use crate::{error, section, success, verbose, warn};

/// Load the configuration file, or the defaults when none is given.
fn load_config(path: Option<&str>) -> Option<InferenceConfig> {
    let Some(path) = path else {
        return Some(InferenceConfig::default());
    };
    match InferenceConfig::from_file(path) {
        Ok(config) => Some(config),
        Err(e) => {
            error!("{e}");
            None
        }
    }
}

/// Classify one clip. Returns the process exit code.
pub fn run_prediction(args: &PredictArgs) -> i32 {
    let Some(mut config) = load_config(args.config.as_deref()) else {
        return 1;
    };

    if let Some(model) = &args.model {
        config = config.with_model_path(model);
    }
    if let Some(device) = &args.device {
        match device.parse::<Device>() {
            Ok(device) => config = config.with_device(device),
            Err(e) => {
                error!("{e}");
                return 1;
            }
        }
    }

    section!("Sign Inference {VERSION}");
    verbose!("Model:  {}", config.model_path.display());
    verbose!("Source: {}", args.source);
    verbose!("Device: {}", config.device);

    let classifier = match SignClassifier::new(config) {
        Ok(classifier) => classifier,
        Err(e) => {
            error!("Invalid configuration: {e}");
            return 1;
        }
    };
    if !classifier.has_network() {
        warn!("Model failed to load; every prediction will report a model error.");
    }

    let classifier = match &args.landmarks {
        Some(path) => match ReplayDetector::from_file(path, classifier.config().detector) {
            Ok(detector) => {
                verbose!("Landmarks: {path} ({} frames)", detector.len());
                classifier.with_detector(SharedDetector::new(detector))
            }
            Err(e) => {
                warn!("{e}");
                classifier
            }
        },
        None => {
            warn!("'landmarks' argument is missing; no landmark detector is available.");
            classifier
        }
    };

    let result = classifier.predict(Source::from(args.source.as_str()));
    report(&result, args.json);

    i32::from(!result.success)
}

/// Print a result as JSON or as a human summary.
fn report(result: &PredictionResult, json: bool) {
    if json {
        match result.to_json() {
            Ok(s) => println!("{s}"),
            Err(e) => {
                error!("{e}");
            }
        }
        return;
    }

    if result.success {
        let class_id = result.class_id.unwrap_or_default();
        success!(
            "Predicted class {} (internal index {class_id})",
            result.predicted_class
        );
        let speed = result.speed;
        verbose!(
            "Speed: {:.1}ms preprocess, {:.1}ms inference, {:.1}ms postprocess ({:.1}ms total)",
            speed.preprocess.unwrap_or(0.0),
            speed.inference.unwrap_or(0.0),
            speed.postprocess.unwrap_or(0.0),
            speed.total()
        );
    } else {
        error!(
            "{}: {}",
            result.predicted_class,
            result.error.as_deref().unwrap_or("unknown failure")
        );
    }
}

/// Print the effective configuration. Returns the process exit code.
pub fn run_config(args: &ConfigArgs) -> i32 {
    let Some(config) = load_config(args.config.as_deref()) else {
        return 1;
    };
    if let Err(e) = config.validate() {
        warn!("{e}");
    }
    match config.to_toml_string() {
        Ok(toml) => {
            print!("{toml}");
            0
        }
        Err(e) => {
            error!("{e}");
            1
        }
    }
}
