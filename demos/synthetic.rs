use shallow_fbcsp::{
    band_power_trials, cross_val_score, parse_arguments, KFold, ShallowFbcspClassifier,
    ShallowFbcspConfig,
};
use std::time::Instant;

fn main() {
    tracing_subscriber::fmt::init();

    let start = Instant::now();

    let options = match parse_arguments() {
        Ok(options) => options,
        Err(e) => {
            eprintln!("{}", e);
            std::process::exit(1);
        }
    };

    let mut config = match &options.config_path {
        Some(path) => match ShallowFbcspConfig::from_json_file(path) {
            Ok(config) => config,
            Err(e) => {
                eprintln!("Invalid configuration: {}", e);
                std::process::exit(1);
            }
        },
        None => ShallowFbcspConfig {
            n_epochs: 20,
            ..Default::default()
        },
    };
    if let Some(n_epochs) = options.n_epochs {
        config.n_epochs = n_epochs;
    }
    config.seed.get_or_insert(options.seed);

    let (x, y) = band_power_trials(
        options.n_trials,
        options.n_chans,
        options.n_times,
        options.n_classes,
        options.seed,
    );

    println!(
        "\nTraining ShallowFBCSPNet on {} trials, number of epochs: {}",
        options.n_trials, config.n_epochs
    );

    let mut classifier = ShallowFbcspClassifier::new(config.clone());
    if let Err(e) = classifier.fit(x.view(), &y) {
        eprintln!("Training failed: {}", e);
        std::process::exit(1);
    }

    if let (Some(losses), Some(accuracies)) =
        (classifier.loss_records(), classifier.accuracy_records())
    {
        let last = losses.nrows() - 1;
        println!("\n=== Final epoch ===");
        println!("Train loss: {:.5}", losses[[last, 0]]);
        println!("Test loss: {:.5}", losses[[last, 1]]);
        println!("Train accuracy: {:.1}%", accuracies[[last, 0]] * 100.0);
        println!("Test accuracy: {:.1}%", accuracies[[last, 1]] * 100.0);
    }

    if options.folds > 0 {
        println!("\n=== {}-fold cross-validation ===", options.folds);
        let cv = KFold::new(options.folds).shuffled(options.seed);
        match cross_val_score(
            || ShallowFbcspClassifier::new(config.clone()),
            x.view(),
            &y,
            &cv,
        ) {
            Ok(scores) => {
                let mean = scores.iter().sum::<f32>() / scores.len() as f32;
                println!("Fold accuracies: {:?}", scores);
                println!("Mean accuracy: {:.1}%", mean * 100.0);
            }
            Err(e) => eprintln!("Cross-validation failed: {}", e),
        }
    }

    println!("\nTotal time: {:.2?}", start.elapsed());
}
