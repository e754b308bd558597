//! Docker configuration generation.
//!
//! Emits the container artifacts for a project from its architectural
//! context: a multi-stage Python backend Dockerfile with a non-root user
//! and `/health` healthcheck, a Node-build-to-nginx frontend Dockerfile,
//! an nginx config proxying `/api/` to the backend, a compose file
//! wiring the services (plus postgres for fullstack systems), and a
//! `.dockerignore`. Container names embed a timestamp so repeated runs
//! never collide.

use crate::core::unix_now;
use crate::error::Result;
use crate::sre::{ArchitecturalContext, SystemType};
use std::path::Path;

/// Generates Docker configuration files.
#[derive(Debug, Clone, Copy, Default)]
pub struct DockerConfigAgent;

impl DockerConfigAgent {
    /// Creates a docker config agent.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Writes the configuration files for a project.
    ///
    /// Returns the project-relative paths created.
    ///
    /// # Errors
    ///
    /// Returns an error if a file cannot be written.
    pub fn generate(
        &self,
        project_root: &Path,
        context: &ArchitecturalContext,
    ) -> Result<Vec<String>> {
        let mut created = Vec::new();
        let fullstack = context.system_type == SystemType::FullstackWebApp;

        if context.has_backend() || fullstack {
            let path = project_root.join("backend");
            std::fs::create_dir_all(&path)?;
            std::fs::write(path.join("Dockerfile"), backend_dockerfile())?;
            created.push("backend/Dockerfile".to_string());
        }

        if context.has_frontend() || fullstack {
            let path = project_root.join("frontend");
            std::fs::create_dir_all(&path)?;
            std::fs::write(path.join("Dockerfile"), frontend_dockerfile())?;
            created.push("frontend/Dockerfile".to_string());
            std::fs::write(path.join("nginx.conf"), nginx_config())?;
            created.push("frontend/nginx.conf".to_string());
        }

        if fullstack {
            let timestamp = unix_now();
            std::fs::write(
                project_root.join("docker-compose.yml"),
                compose_file(context, timestamp),
            )?;
            created.push("docker-compose.yml".to_string());
        }

        std::fs::write(project_root.join(".dockerignore"), dockerignore())?;
        created.push(".dockerignore".to_string());

        tracing::info!(files = created.len(), "docker configuration written");
        Ok(created)
    }
}

/// Multi-stage FastAPI backend image.
fn backend_dockerfile() -> &'static str {
    r#"# Backend Dockerfile
FROM python:3.11-slim

WORKDIR /app

# System dependencies first for layer caching
RUN apt-get update && apt-get install -y \
    gcc \
    curl \
    && apt-get clean \
    && rm -rf /var/lib/apt/lists/*

# Non-root user
RUN useradd --create-home --shell /bin/bash app

COPY requirements.txt .

RUN pip install --no-cache-dir --upgrade pip \
    && pip install --no-cache-dir -r requirements.txt \
    && pip install --no-cache-dir pip-audit

RUN chown -R app:app /app
USER app

COPY --chown=app:app . .

HEALTHCHECK --interval=60s --timeout=15s --start-period=45s --retries=3 \
    CMD curl -f http://localhost:8000/health || exit 1

EXPOSE 8000

CMD ["uvicorn", "main:app", "--host", "0.0.0.0", "--port", "8000", "--workers", "1"]
"#
}

/// Node build stage into an nginx serve stage.
fn frontend_dockerfile() -> &'static str {
    r#"# Frontend Dockerfile
FROM node:18-alpine AS builder

WORKDIR /app

COPY package*.json ./

RUN npm ci --silent \
    && npm cache clean --force

COPY . .

RUN npm run build

FROM nginx:alpine

RUN addgroup -g 1001 -S nodejs \
    && adduser -S frontend -u 1001

COPY --from=builder --chown=frontend:nodejs /app/dist /usr/share/nginx/html

COPY nginx.conf /etc/nginx/conf.d/default.conf

EXPOSE 80

HEALTHCHECK --interval=60s --timeout=10s --start-period=30s --retries=3 \
    CMD wget --no-verbose --tries=1 --spider http://localhost/health || exit 1

CMD ["nginx", "-g", "daemon off;"]
"#
}

/// nginx config serving the build and proxying `/api/` to the backend.
fn nginx_config() -> &'static str {
    r#"server {
    listen 80;
    server_name localhost;

    location / {
        root /usr/share/nginx/html;
        index index.html index.htm;
        try_files $uri $uri/ /index.html;
    }

    # API proxy to the backend service
    location /api/ {
        proxy_pass http://backend:8000/;
        proxy_set_header Host $host;
        proxy_set_header X-Real-IP $remote_addr;
        proxy_set_header X-Forwarded-For $proxy_add_x_forwarded_for;
        proxy_set_header X-Forwarded-Proto $scheme;
        proxy_connect_timeout 30s;
        proxy_send_timeout 30s;
        proxy_read_timeout 30s;
    }

    location /health {
        access_log off;
        return 200 "OK";
        add_header Content-Type text/plain;
    }

    gzip on;
    gzip_vary on;
    gzip_min_length 1024;
    gzip_types
        text/plain
        text/css
        text/javascript
        application/javascript
        application/json;

    add_header X-Frame-Options DENY;
    add_header X-Content-Type-Options nosniff;
}
"#
}

/// Compose file wiring backend, frontend, and the database.
fn compose_file(context: &ArchitecturalContext, timestamp: i64) -> String {
    let mut out = String::from("services:");

    if context.has_backend() {
        out.push_str(&format!(
            r#"
  backend:
    build:
      context: ./backend
      dockerfile: Dockerfile
    container_name: app-backend-{timestamp}
    ports:
      - "8000:8000"
    environment:
      - ENVIRONMENT=development
      - DATABASE_URL=postgresql://user:password@db:5432/appdb
      - CORS_ORIGINS=http://localhost:3000
    depends_on:
      db:
        condition: service_healthy
    networks:
      - app-network
    restart: unless-stopped
    healthcheck:
      test: ["CMD", "curl", "--fail", "http://localhost:8000/health"]
      interval: 30s
      timeout: 10s
      retries: 3
      start_period: 40s"#
        ));
    }

    if context.has_frontend() {
        out.push_str(&format!(
            r#"
  frontend:
    build:
      context: ./frontend
      dockerfile: Dockerfile
    container_name: app-frontend-{timestamp}
    ports:
      - "3000:80"
    environment:
      - REACT_APP_API_URL=http://localhost:8000
    depends_on:
      backend:
        condition: service_healthy
    networks:
      - app-network
    restart: unless-stopped"#
        ));
    }

    out.push_str(&format!(
        r#"
  db:
    image: postgres:15-alpine
    container_name: app-db-{timestamp}
    environment:
      - POSTGRES_USER=user
      - POSTGRES_PASSWORD=password
      - POSTGRES_DB=appdb
    ports:
      - "5432:5432"
    volumes:
      - postgres_data:/var/lib/postgresql/data
    networks:
      - app-network
    restart: unless-stopped
    healthcheck:
      test: ["CMD", "pg_isready", "-U", "user", "-d", "appdb"]
      interval: 10s
      timeout: 5s
      retries: 5
      start_period: 30s

networks:
  app-network:
    driver: bridge

volumes:
  postgres_data:
    driver: local
"#
    ));

    out
}

/// Files excluded from every image build context.
fn dockerignore() -> &'static str {
    r"# Dependencies
node_modules/
__pycache__/
*.pyc
*.pyo
.Python

# IDEs
.vscode/
.idea/
*.swp

# OS
.DS_Store
Thumbs.db

# Git
.git/
.gitignore

# Logs
*.log
logs/

# Coverage
coverage/
.coverage

# Build outputs
dist/
build/
*.egg-info/

# Environment
.env
.env.local

# Docker
Dockerfile
docker-compose*.yml
.dockerignore
"
}
