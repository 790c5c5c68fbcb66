use anyhow::{Context, Result};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::time::{Duration, timeout};
use tracing::{error, info, warn};

const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const REQUEST_TIMEOUT_MS: u64 = 60_000;

pub const DEFAULT_MODEL: &str = "gpt-4o";
pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_TEMPERATURE: f64 = 0.7;

#[derive(Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f64,
}

#[derive(Serialize)]
struct ChatMessage {
    role: &'static str,
    content: String,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ResponseMessage,
}

#[derive(Deserialize)]
struct ResponseMessage {
    content: String,
}

struct FewShotExample {
    subject: &'static str,
    description: &'static str,
    failure_type: &'static str,
}

/// Classifies LINAC downtime reports into failure types via a chat
/// completion endpoint.
pub struct FailureClassifier {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f64,
    formatted_examples: String,
}

impl FailureClassifier {
    /// `api_key = None` falls back to the `OPENAI_API_KEY` environment
    /// variable; a missing key is the only construction failure.
    pub fn new(api_key: Option<String>, model: impl Into<String>) -> Result<Self> {
        let api_key = match api_key {
            Some(key) => key,
            None => std::env::var("OPENAI_API_KEY").context(
                "OpenAI API key not found. Set OPENAI_API_KEY or pass --api-key",
            )?,
        };

        let classifier = Self {
            client: Client::new(),
            api_key,
            model: model.into(),
            base_url: OPENAI_BASE_URL.to_string(),
            temperature: DEFAULT_TEMPERATURE,
            formatted_examples: format_examples(),
        };
        info!(model = %classifier.model, "initialized failure classifier");
        Ok(classifier)
    }

    /// Point the client at a different endpoint (tests, proxies).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    /// Classify one report. Total over its inputs: every failure collapses
    /// into a sentinel result object, nothing is raised past this boundary.
    ///
    /// Parse and transport failures are both retried immediately up to
    /// `max_retries` attempts; after the last attempt the result carries
    /// `failure_type` `"ParseError"` or `"APIError"`. A zero attempt budget
    /// yields `"UnknownError"`.
    pub async fn classify_report(
        &self,
        subject: &str,
        description: &str,
        max_retries: u32,
    ) -> Value {
        let user_prompt = self.build_user_prompt(subject, description);

        for attempt in 1..=max_retries {
            match self.attempt(&user_prompt).await {
                Ok(result) => return result,
                Err(ClassifyError::Parse { raw_response, message }) => {
                    warn!(attempt, max_retries, %message, "JSON parse error");
                    if attempt == max_retries {
                        return json!({
                            "failure_type": "ParseError",
                            "raw_response": raw_response,
                            "error": message,
                        });
                    }
                }
                Err(err) => {
                    error!(attempt, max_retries, %err, "API call error");
                    if attempt == max_retries {
                        return json!({
                            "failure_type": "APIError",
                            "error": err.to_string(),
                        });
                    }
                }
            }
        }

        json!({ "failure_type": "UnknownError" })
    }

    async fn attempt(&self, user_prompt: &str) -> Result<Value, ClassifyError> {
        let request = ChatRequest {
            model: self.model.clone(),
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_PROMPT.to_string(),
                },
                ChatMessage {
                    role: "user",
                    content: user_prompt.to_string(),
                },
            ],
            temperature: self.temperature,
        };

        // A hung call must not stall the whole batch.
        let response = timeout(
            Duration::from_millis(REQUEST_TIMEOUT_MS),
            self.client
                .post(format!("{}/chat/completions", self.base_url))
                .bearer_auth(&self.api_key)
                .json(&request)
                .send(),
        )
        .await
        .map_err(|_| ClassifyError::Timeout)?
        .map_err(ClassifyError::Request)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Status { status, body });
        }

        let chat: ChatResponse = response.json().await.map_err(ClassifyError::Request)?;
        let content = chat
            .choices
            .first()
            .map(|choice| choice.message.content.as_str())
            .ok_or(ClassifyError::MissingContent)?;

        let result_text = extract_json(content);
        serde_json::from_str(&result_text).map_err(|err| ClassifyError::Parse {
            raw_response: result_text.clone(),
            message: err.to_string(),
        })
    }

    fn build_user_prompt(&self, subject: &str, description: &str) -> String {
        format!(
            "Here are the examples:\n{}\n\nClassify this report:\nFailure_type must be selected exclusively from the defined Failure Type categories.\n\n**LINAC downtime report**\nSubject: {subject}\nDescription: {description}\n",
            self.formatted_examples
        )
    }
}

/// Few-shot block, built once at construction and reused per call.
fn format_examples() -> String {
    EXAMPLES
        .iter()
        .map(|ex| {
            format!(
                "**Example report**\nSubject: {}\nDescription: {}\nFailure Type: {}\n",
                ex.subject, ex.description, ex.failure_type
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Pull the payload out of a markdown fence when the model wraps its answer
/// in one; otherwise return the trimmed text as-is.
fn extract_json(text: &str) -> String {
    let text = text.trim();
    if let Some(idx) = text.find("```json") {
        let rest = &text[idx + "```json".len()..];
        return rest.split("```").next().unwrap_or(rest).trim().to_string();
    }
    if let Some(idx) = text.find("```") {
        let rest = &text[idx + "```".len()..];
        return rest.split("```").next().unwrap_or(rest).trim().to_string();
    }
    text.to_string()
}

#[derive(Debug)]
enum ClassifyError {
    Timeout,
    Request(reqwest::Error),
    Status {
        status: reqwest::StatusCode,
        body: String,
    },
    MissingContent,
    Parse {
        raw_response: String,
        message: String,
    },
}

impl std::fmt::Display for ClassifyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ClassifyError::Timeout => write!(f, "request timed out"),
            ClassifyError::Request(err) => write!(f, "request error: {err}"),
            ClassifyError::Status { status, body } => {
                write!(f, "API error ({status}): {body}")
            }
            ClassifyError::MissingContent => write!(f, "response contained no choices"),
            ClassifyError::Parse { message, .. } => write!(f, "parse error: {message}"),
        }
    }
}

impl std::error::Error for ClassifyError {}

const SYSTEM_PROMPT: &str = r#"
You are an expert medical engineering assistant who specializes in LINAC system troubleshooting.

Your job is to review the subject and description of LINAC failure reports and classify each report into one or more Failure Types.

Return your result in JSON format only with key: `failure_type` and value: category (or comma-separated categories) like:
{
  "failure_type": "Imaging System (KV/MV)"
}

### Failure Type Categories:

- "Beam Generation": Components responsible for creating, accelerating, and bending the initial electron beam, including the electron gun, linear accelerator, bending magnet, and RF power source (Klystron/Magnetron).
- "Collimation System": Systems that define the final shape of the radiation beam, including primary jaws, multi-leaf collimator (MLC), target carousel, and flattening filters/scattering foils.
- "Gantry Motion/Structure": The mechanical system responsible for rotating the gantry, including drive motors, bearings, position sensors (resolvers/encoders), and the structural frame.
- "Imaging System (KV/MV)": Hardware used for patient setup and verification imaging, including the kV X-ray source, kV flat-panel detector, MV electronic portal imaging device (EPID), and associated retractable arms.
- "Treatment Couch": The patient support system, including its motorized axes (longitudinal, lateral, vertical, rotation, pitch, roll), control pendants, and structural components.
- "Control Hardware": The distributed network of physical electronic controllers (Supervisor, Nodes), processing boards, and safety interlock circuit hardware managing machine operations.
- "System Networks": Communication infrastructure connecting system components, including CAN bus, Ethernet networks, HSSB, and associated wiring/connectors.
- "Cooling System": Systems managing the thermal environment of critical components, primarily the water cooling system (chiller, pumps, flow sensors) and specialized gas systems (e.g., SF6 for waveguide).
- "Power System/Distribution": Components managing the input and distribution of electrical power, including the modulator cabinet, main breakers, high-voltage circuits, uninterruptible power supply (UPS), and power conditioning.
- "Ancillary Room Systems": Supporting equipment within the treatment room, such as positioning lasers, in-room cameras (CCTV/Optical Guidance), and room monitors.
- "Safety Systems": Components specifically designed for personnel and equipment safety, such as emergency stop buttons, door interlocks, collision detection sensors, and radiation monitoring systems.
- "Operator Console/UI": User interface systems, display monitors, control pendants, and software interface components.

Each report can have multiple labels separated by comma. Your output must always be in dictionary format with key: `failure_type`.

Think carefully step by step and analyze the report content logically before classifying.
"#;

const EXAMPLES: [FewShotExample; 3] = [
    FewShotExample {
        subject: "GFIL, down",
        description: "Customer is getting intermittent GFIL interlock and high vacuum activity in the electron gun. 6e energy will not run at selected dose rate. Inspected hot deck and cold deck in the gantry, downloaded gun controller parameters from the gun controller using boardman. Noted unusually high values for the grid voltage for all energies, and HV settings incorrect. Reprogrammed gun controller with grid and HV values from their other machine. Performed basic beam tuning for all energies, verified operation all energies. Observed site physics perform their QA procedure, site resumed treating patients.",
        failure_type: "Beam Generation",
    },
    FewShotExample {
        subject: "MLC is failing and secondary feedback",
        description: "Friday 6-29-2012: MLC down upon arrival, MLC fault #420220 leaf B20 trajectory deviation R/O = 66.56cm. Replaced the leaf motor, swapped the SFB PCB & Head Transceiver/Motor Driver PCB's (no help). As t/s ordered NFO parts ... SoftPot Iso Crg-B & Crg-B Motor I/C PCB. Saturday 6-30-2012: NFO parts pick-up Chicago O'Hare airport. Assembled MLC & verified original problem MLC fault #420220. Shutdown MLC power supply & rebooted Collimator Node ... then power MLC & successfully initialized. Ran MLC autocycle & successfully initialized MLC at gantry zero & 180 (multiple times). Could not successfully initialize the Y-Jaws due to Y1 over-current fault #415007. Verified both Jaw outer Limits & Inner Limits. Found during jaw initialization process that the jaws would come together physically & Y1 would draw high current. Made slight adjustment to the collision switch position & successfully initialized jaws. Completed Jaw Calibration (internal) and saved configuration.",
        failure_type: "Collimation System",
    },
    FewShotExample {
        subject: "Installed floating monitor arms.",
        description: "Mounted 4 Linac control monitors on the floating arms. Same configuration as Trilogy",
        failure_type: "Operator Console/UI",
    },
];
