use base64::Engine;
use colored::*;
use serde_json::{json, Value};
use std::io::{self, Write};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("{}", "🚗 Rental Workflow Testing Tool".bright_blue().bold());
    println!("{}", "=====================================".bright_blue());
    println!();

    // Paso 1: URL del gateway y agencia
    let base_url = prompt("URL del gateway (ej: http://localhost:3000): ")?;
    let base_url = base_url.trim_end_matches('/').to_string();
    let agency_id = prompt("Agency ID (UUID): ")?;

    let client = reqwest::Client::new();

    // Paso 2: Menú principal
    loop {
        println!();
        println!("{}", "📋 MENÚ PRINCIPAL".bright_green().bold());
        println!("{}", "==================".bright_green());
        println!("1. 🧾 Ejecutar una location completa (5 etapas)");
        println!("2. 🔍 Ver estado de una sesión");
        println!("3. 🚪 Salir");
        print!("{}", "Selecciona una opción (1-3): ".bright_yellow());
        io::stdout().flush()?;

        let mut choice = String::new();
        io::stdin().read_line(&mut choice)?;
        let choice = choice.trim();

        match choice {
            "1" => {
                if let Err(e) = run_full_workflow(&client, &base_url, &agency_id).await {
                    println!("{} {}", "❌ Workflow falló:".bright_red(), e);
                }
            }
            "2" => {
                let session_id = prompt("Session ID: ")?;
                match get_json(
                    &client,
                    &format!("{}/api/workflow/{}", base_url, session_id),
                )
                .await
                {
                    Ok(view) => {
                        println!("{}", serde_json::to_string_pretty(&view)?);
                    }
                    Err(e) => println!("{} {}", "❌".bright_red(), e),
                }
            }
            "3" => {
                println!("{}", "👋 ¡Hasta luego!".bright_green());
                break;
            }
            _ => {
                println!("{}", "❌ Opción inválida. Intenta de nuevo.".bright_red());
            }
        }
    }

    Ok(())
}

async fn run_full_workflow(
    client: &reqwest::Client,
    base_url: &str,
    agency_id: &str,
) -> anyhow::Result<()> {
    println!();
    println!("{}", "🆕 CREANDO SESIÓN DE WORKFLOW...".bright_cyan().bold());
    let session: Value = post_json(
        client,
        &format!("{}/api/workflow", base_url),
        &json!({ "agencyId": agency_id }),
    )
    .await?;
    let session_id = session["id"].as_str().unwrap_or_default().to_string();
    println!("✅ Sesión creada: {}", session_id.bright_white());

    // Etapa 1: cliente
    println!();
    println!("{}", "👤 ETAPA 1 - CLIENTE".bright_cyan().bold());
    let term = prompt("Buscar cliente (término, vacío para listar): ")?;
    let url = if term.is_empty() {
        format!("{}/api/workflow/{}/customers", base_url, session_id)
    } else {
        format!(
            "{}/api/workflow/{}/customers?search={}",
            base_url, session_id, term
        )
    };
    let results = get_json(client, &url).await?;
    let customers = results["customers"].as_array().cloned().unwrap_or_default();

    if customers.is_empty() {
        println!("{}", "Sin resultados, creando cliente nuevo...".yellow());
        let first_name = prompt("Prénom: ")?;
        let last_name = prompt("Nom: ")?;
        let email = prompt("Email: ")?;
        let phone = prompt("Téléphone: ")?;
        let cin = prompt("CIN: ")?;
        post_json(
            client,
            &format!("{}/api/workflow/{}/customer/create", base_url, session_id),
            &json!({
                "firstName": first_name,
                "lastName": last_name,
                "email": email,
                "phone": phone,
                "cinNumber": cin,
            }),
        )
        .await?;
        println!("✅ Cliente creado y seleccionado");
    } else {
        for c in &customers {
            println!(
                "  [{}] {} {} - {}",
                c["id"], c["firstName"], c["lastName"], c["email"]
            );
        }
        let customer_id: i64 = prompt("Customer ID a seleccionar: ")?.parse()?;
        post_json(
            client,
            &format!("{}/api/workflow/{}/customer/select", base_url, session_id),
            &json!({ "customerId": customer_id }),
        )
        .await?;
        println!("✅ Cliente seleccionado");
    }

    // Etapa 2: vehículo y fechas
    println!();
    println!("{}", "🚗 ETAPA 2 - VEHÍCULO Y FECHAS".bright_cyan().bold());
    let start_date = prompt("Date de début (YYYY-MM-DD): ")?;
    let end_date = prompt("Date de fin (YYYY-MM-DD): ")?;
    let vehicles = get_json(
        client,
        &format!(
            "{}/api/workflow/{}/vehicles?startDate={}&endDate={}",
            base_url, session_id, start_date, end_date
        ),
    )
    .await?;
    let vehicles = vehicles.as_array().cloned().unwrap_or_default();
    if vehicles.is_empty() {
        anyhow::bail!("no hay vehículos disponibles para ese período");
    }
    for v in &vehicles {
        println!(
            "  [{}] {} {} - {} DT/jour",
            v["id"], v["brand"], v["model"], v["dailyRate"]
        );
    }
    let vehicle_id = prompt("Vehicle ID a seleccionar: ")?;
    let view = post_json(
        client,
        &format!("{}/api/workflow/{}/vehicle", base_url, session_id),
        &json!({
            "vehicleId": vehicle_id,
            "startDate": start_date,
            "endDate": end_date,
        }),
    )
    .await?;
    let total = view["quote"]["totalAmount"].clone();
    println!("✅ Tarificación: total {} DT", total.to_string().bright_white());

    // Etapa 3: contrato
    println!();
    println!("{}", "📄 ETAPA 3 - CONTRATO".bright_cyan().bold());
    post_json(
        client,
        &format!("{}/api/workflow/{}/contract", base_url, session_id),
        &json!({ "acceptTerms": true }),
    )
    .await?;
    println!("✅ Contrat préparé et accepté");

    // Etapa 4: pago
    println!();
    println!("{}", "💰 ETAPA 4 - PAGO".bright_cyan().bold());
    let deposit = prompt("¿Caution pagada? (s/n): ")?;
    post_json(
        client,
        &format!("{}/api/workflow/{}/payment", base_url, session_id),
        &json!({
            "amountPaid": total,
            "paymentMethod": "especes",
            "depositPaid": deposit.eq_ignore_ascii_case("s"),
        }),
    )
    .await?;
    println!("✅ Paiement validé");

    // Etapa 5: finalización
    println!();
    println!("{}", "🏁 ETAPA 5 - FINALIZACIÓN".bright_cyan().bold());
    let response = post_json(
        client,
        &format!("{}/api/workflow/{}/finalize", base_url, session_id),
        &json!({}),
    )
    .await?;

    let booking_id = response["bookingId"].clone();
    let contract_id = response["contractId"].clone();
    println!(
        "🎉 Location finalisée: réservation {}, contrat {}",
        booking_id.to_string().bright_white(),
        contract_id.to_string().bright_white()
    );

    // Guardar el PDF descargado
    if let Some(encoded) = response["contractPdfBase64"].as_str() {
        let file_name = response["fileName"]
            .as_str()
            .unwrap_or("contrat-location.pdf")
            .to_string();
        let bytes = base64::engine::general_purpose::STANDARD.decode(encoded)?;
        std::fs::write(&file_name, bytes)?;
        println!("📄 Contrat PDF guardado en {}", file_name.bright_white());
    }

    Ok(())
}

fn prompt(label: &str) -> io::Result<String> {
    print!("{}", label.bright_yellow());
    io::stdout().flush()?;
    let mut value = String::new();
    io::stdin().read_line(&mut value)?;
    Ok(value.trim().to_string())
}

async fn get_json(client: &reqwest::Client, url: &str) -> anyhow::Result<Value> {
    let response = client.get(url).send().await?;
    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        anyhow::bail!("{}: {}", status, body["message"].as_str().unwrap_or("error"));
    }
    Ok(body)
}

async fn post_json(
    client: &reqwest::Client,
    url: &str,
    body: &Value,
) -> anyhow::Result<Value> {
    let response = client.post(url).json(body).send().await?;
    let status = response.status();
    let body: Value = response.json().await?;
    if !status.is_success() {
        anyhow::bail!("{}: {}", status, body["message"].as_str().unwrap_or("error"));
    }
    Ok(body)
}
